//! TAP+ sharing service: groups of users and tables shared with them.

use log::info;

use super::plus::TapPlus;
use crate::conn::{check_response_status, url_encode};
use crate::error::{ErrorContext, TapError, TapResult};
use crate::model::{TapGroup, TapSharedItem};
use crate::xmlparser;

/// `resource_type` of a shared table.
const TABLE_RESOURCE_TYPE: &str = "0";

impl TapPlus {
    /// Groups owned by, or including, the current user.
    pub async fn load_groups(&self) -> TapResult<Vec<TapGroup>> {
        let context = ErrorContext::new("load_groups");
        let response = self.conn().execute_share_get("action=GetGroups").await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        xmlparser::parse_groups(&body).map_err(|e| e.with_context(context))
    }

    /// Group with the given title.
    pub async fn load_group(&self, group_name: &str) -> TapResult<Option<TapGroup>> {
        Ok(self
            .load_groups()
            .await?
            .into_iter()
            .find(|g| g.title == group_name))
    }

    pub async fn load_shared_items(&self) -> TapResult<Vec<TapSharedItem>> {
        let context = ErrorContext::new("load_shared_items");
        let response = self
            .conn()
            .execute_share_get("action=GetSharedItems")
            .await?;
        check_response_status(&response, 200, context.clone())?;
        let body = response.decoded_body()?;
        xmlparser::parse_shared_items(&body).map_err(|e| e.with_context(context))
    }

    /// Share a table with a group, read only.
    pub async fn share_table(
        &self,
        group_name: &str,
        table_name: &str,
        description: &str,
    ) -> TapResult<()> {
        require("group_name", group_name)?;
        require("table_name", table_name)?;
        let group = self.require_group(group_name).await?;
        let items = format!("{}|Group|Read", group.id);
        let data = url_encode(&[
            ("action", "CreateOrUpdateItem"),
            ("resource_type", TABLE_RESOURCE_TYPE),
            ("title", table_name),
            ("description", description),
            ("items_list", items.as_str()),
        ]);
        self.share_post(&data, "share_table", table_name).await?;
        info!("Table '{}' shared with group '{}'", table_name, group_name);
        Ok(())
    }

    /// Stop sharing a table.
    pub async fn share_table_stop(&self, table_name: &str) -> TapResult<()> {
        require("table_name", table_name)?;
        let item = self
            .load_shared_items()
            .await?
            .into_iter()
            .find(|i| i.title == table_name)
            .ok_or_else(|| {
                TapError::invalid_argument(format!("Table '{}' is not shared", table_name))
            })?;
        let data = url_encode(&[
            ("action", "RemoveItem"),
            ("resource_type", TABLE_RESOURCE_TYPE),
            ("resource_id", item.id.as_str()),
        ]);
        self.share_post(&data, "share_table_stop", table_name).await?;
        info!("Table '{}' no longer shared", table_name);
        Ok(())
    }

    pub async fn share_group_create(&self, group_name: &str, description: &str) -> TapResult<()> {
        require("group_name", group_name)?;
        if self.load_group(group_name).await?.is_some() {
            return Err(TapError::invalid_argument(format!(
                "Group '{}' already exists",
                group_name
            )));
        }
        let data = url_encode(&[
            ("action", "CreateOrUpdateGroup"),
            ("title", group_name),
            ("description", description),
        ]);
        self.share_post(&data, "share_group_create", group_name).await?;
        info!("Group '{}' created", group_name);
        Ok(())
    }

    pub async fn share_group_delete(&self, group_name: &str) -> TapResult<()> {
        require("group_name", group_name)?;
        let group = self.require_group(group_name).await?;
        let data = url_encode(&[("action", "RemoveGroup"), ("group_id", group.id.as_str())]);
        self.share_post(&data, "share_group_delete", group_name).await?;
        info!("Group '{}' deleted", group_name);
        Ok(())
    }

    /// Add a user to a group. The user must exist and not be a member yet.
    pub async fn share_group_add_user(&self, group_name: &str, user_id: &str) -> TapResult<()> {
        require("group_name", group_name)?;
        require("user_id", user_id)?;
        if !self.is_valid_user(user_id).await? {
            return Err(TapError::invalid_argument(format!(
                "User id '{}' not found",
                user_id
            )));
        }
        let group = self.require_group(group_name).await?;
        if group.has_user(user_id) {
            return Err(TapError::invalid_argument(format!(
                "User id '{}' found in group '{}'",
                user_id, group_name
            )));
        }
        let mut users: Vec<&str> = group.users.iter().map(|u| u.id.as_str()).collect();
        users.push(user_id);
        self.update_group_users(&group, &users, "share_group_add_user")
            .await?;
        info!("User '{}' added to group '{}'", user_id, group_name);
        Ok(())
    }

    /// Remove a user from a group.
    pub async fn share_group_delete_user(&self, group_name: &str, user_id: &str) -> TapResult<()> {
        require("group_name", group_name)?;
        require("user_id", user_id)?;
        let group = self.require_group(group_name).await?;
        if !group.has_user(user_id) {
            return Err(TapError::invalid_argument(format!(
                "User id '{}' not found in group '{}'",
                user_id, group_name
            )));
        }
        let users: Vec<&str> = group
            .users
            .iter()
            .map(|u| u.id.as_str())
            .filter(|id| *id != user_id)
            .collect();
        self.update_group_users(&group, &users, "share_group_delete_user")
            .await?;
        info!("User '{}' removed from group '{}'", user_id, group_name);
        Ok(())
    }

    /// Whether the users service knows `user_id`.
    ///
    /// The service answers one `id:name` line per matching user.
    pub async fn is_valid_user(&self, user_id: &str) -> TapResult<bool> {
        let query = url_encode(&[("USER", user_id)]);
        let response = self.conn().execute_users_get(&query).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new("is_valid_user").with_entity_id(user_id),
        )?;
        let text = String::from_utf8_lossy(&response.decoded_body()?).into_owned();
        Ok(text
            .lines()
            .filter_map(|line| line.split(':').next())
            .any(|id| id.trim() == user_id))
    }

    async fn require_group(&self, group_name: &str) -> TapResult<TapGroup> {
        self.load_group(group_name)
            .await?
            .ok_or_else(|| TapError::invalid_argument(format!("Group '{}' not found", group_name)))
    }

    async fn update_group_users(
        &self,
        group: &TapGroup,
        users: &[&str],
        operation: &str,
    ) -> TapResult<()> {
        let users = users.join(",");
        let data = url_encode(&[
            ("action", "CreateOrUpdateGroup"),
            ("group_id", group.id.as_str()),
            ("title", group.title.as_str()),
            ("description", group.description.as_deref().unwrap_or_default()),
            ("users_list", users.as_str()),
        ]);
        self.share_post(&data, operation, &group.title).await
    }

    async fn share_post(&self, data: &str, operation: &str, entity_id: &str) -> TapResult<()> {
        let response = self.conn().execute_share_post(data).await?;
        check_response_status(
            &response,
            200,
            ErrorContext::new(operation).with_entity_id(entity_id),
        )
    }
}

fn require(argument: &str, value: &str) -> TapResult<()> {
    if value.trim().is_empty() {
        return Err(TapError::invalid_argument(format!(
            "Missing mandatory argument '{}'",
            argument
        )));
    }
    Ok(())
}
