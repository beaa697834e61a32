use super::{non_empty, walk, Node};
use crate::error::TapResult;
use crate::model::{TapGroup, TapSharedItem, TapSharedToItem, TapUser};

/// Parse the groups returned by `share?action=GetGroups`.
///
/// Identifiers come as attributes; title and description may be given either
/// as attributes or as child elements.
pub fn parse_groups(data: &[u8]) -> TapResult<Vec<TapGroup>> {
    let mut groups = Vec::new();
    let mut group: Option<TapGroup> = None;
    let mut user: Option<TapUser> = None;

    walk(data, |node| {
        match node {
            Node::Open { name: "group", attrs } => {
                group = Some(TapGroup {
                    id: attrs.owned("id").unwrap_or_default(),
                    owner: attrs.owned("owner"),
                    title: attrs.owned("title").unwrap_or_default(),
                    description: attrs.owned("description"),
                    users: Vec::new(),
                });
            }
            Node::Open { name: "user", attrs } if group.is_some() => {
                user = Some(TapUser {
                    id: attrs.owned("id").unwrap_or_default(),
                    name: attrs.owned("name"),
                });
            }
            Node::Open { .. } => {}
            Node::Close { name, text } => {
                if let Some(u) = user.as_mut() {
                    match name {
                        "id" => u.id = text.to_string(),
                        "name" => u.name = non_empty(text),
                        "user" => {
                            if let (Some(done), Some(g)) = (user.take(), group.as_mut()) {
                                g.users.push(done);
                            }
                        }
                        _ => {}
                    }
                } else if let Some(g) = group.as_mut() {
                    match name {
                        "id" => g.id = text.to_string(),
                        "owner" => g.owner = non_empty(text),
                        "title" => g.title = text.to_string(),
                        "description" => g.description = non_empty(text),
                        "group" => {
                            if let Some(done) = group.take() {
                                groups.push(done);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    })?;

    Ok(groups)
}

/// Parse the items returned by `share?action=GetSharedItems`.
pub fn parse_shared_items(data: &[u8]) -> TapResult<Vec<TapSharedItem>> {
    let mut items = Vec::new();
    let mut item: Option<TapSharedItem> = None;

    walk(data, |node| {
        match node {
            Node::Open {
                name: "sharedItem",
                attrs,
            } => {
                item = Some(TapSharedItem {
                    id: attrs.owned("id").unwrap_or_default(),
                    item_type: attrs.owned("type"),
                    title: attrs.owned("title").unwrap_or_default(),
                    description: attrs.owned("description"),
                    shared_to: Vec::new(),
                });
            }
            Node::Open {
                name: "sharedToItem",
                attrs,
            } => {
                if let Some(it) = item.as_mut() {
                    it.shared_to.push(TapSharedToItem {
                        id: attrs
                            .owned("shareTo")
                            .or_else(|| attrs.owned("id"))
                            .unwrap_or_default(),
                        share_type: attrs
                            .owned("shareType")
                            .or_else(|| attrs.owned("type"))
                            .unwrap_or_default(),
                        mode: attrs
                            .owned("shareMode")
                            .or_else(|| attrs.owned("mode"))
                            .unwrap_or_default(),
                    });
                }
            }
            Node::Open { .. } => {}
            Node::Close { name, text } => {
                let Some(it) = item.as_mut() else {
                    return Ok(());
                };
                match name {
                    "title" => it.title = text.to_string(),
                    "description" => it.description = non_empty(text),
                    "sharedItem" => {
                        if let Some(done) = item.take() {
                            items.push(done);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    })?;

    Ok(items)
}
