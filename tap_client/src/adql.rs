//! ADQL helpers: row limits, qualified names and positional query templates.

use qtty::{Arcseconds, Degrees};

use crate::error::{TapError, TapResult};

/// Smallest cross-match radius accepted by TAP+ servers.
pub const MIN_CROSSMATCH_RADIUS_ARCSEC: f64 = 0.1;
/// Largest cross-match radius accepted by TAP+ servers.
pub const MAX_CROSSMATCH_RADIUS_ARCSEC: f64 = 10.0;

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte ranges of the words of `query`, quoted literals skipped.
fn words(query: &str) -> Vec<(usize, usize)> {
    let bytes = query.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\'' || b == b'"' {
            i += 1;
            while i < bytes.len() && bytes[i] != b {
                i += 1;
            }
            i += 1;
        } else if is_word_byte(b) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            out.push((start, i));
        } else {
            i += 1;
        }
    }
    out
}

/// Insert `TOP n` after the first `SELECT` (or `SELECT DISTINCT`/`ALL`).
///
/// Queries already holding a `TOP` clause, or with no `SELECT`, are
/// returned unchanged.
pub fn set_top_in_query(query: &str, top: u64) -> String {
    let words = words(query);
    let is = |(s, e): (usize, usize), kw: &str| query[s..e].eq_ignore_ascii_case(kw);

    if words.iter().any(|w| is(*w, "TOP")) {
        return query.to_string();
    }
    let Some(pos) = words.iter().position(|w| is(*w, "SELECT")) else {
        return query.to_string();
    };
    let mut insert_at = words[pos].1;
    if let Some(next) = words.get(pos + 1) {
        if is(*next, "DISTINCT") || is(*next, "ALL") {
            insert_at = next.1;
        }
    }
    format!("{} TOP {}{}", &query[..insert_at], top, &query[insert_at..])
}

/// Split `schema.table` into its parts. Names without a schema yield `None`.
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((schema, table)) if !schema.is_empty() => (Some(schema), table),
        Some((_, table)) => (None, table),
        None => (None, name),
    }
}

fn validate_position(ra: Degrees, dec: Degrees) -> TapResult<()> {
    if !ra.value().is_finite() || !dec.value().is_finite() {
        return Err(TapError::invalid_argument("Coordinates must be finite"));
    }
    if !(-90.0..=90.0).contains(&dec.value()) {
        return Err(TapError::invalid_argument(format!(
            "Invalid declination {}: valid range is -90 to 90 degrees",
            dec.value()
        )));
    }
    Ok(())
}

/// Circular search around a position.
#[derive(Debug, Clone, PartialEq)]
pub struct ConeSearch {
    pub table: String,
    pub ra_column: String,
    pub dec_column: String,
    pub ra: Degrees,
    pub dec: Degrees,
    pub radius: Degrees,
    /// Selected columns, `*` when empty.
    pub columns: Vec<String>,
}

impl ConeSearch {
    pub fn new(table: impl Into<String>, ra: Degrees, dec: Degrees, radius: Degrees) -> Self {
        Self {
            table: table.into(),
            ra_column: "ra".to_string(),
            dec_column: "dec".to_string(),
            ra,
            dec,
            radius,
            columns: Vec::new(),
        }
    }

    pub fn with_position_columns(
        mut self,
        ra_column: impl Into<String>,
        dec_column: impl Into<String>,
    ) -> Self {
        self.ra_column = ra_column.into();
        self.dec_column = dec_column.into();
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> TapResult<()> {
        if self.table.trim().is_empty() {
            return Err(TapError::invalid_argument("Table name is mandatory"));
        }
        validate_position(self.ra, self.dec)?;
        if !(self.radius.value() > 0.0) {
            return Err(TapError::invalid_argument(format!(
                "Invalid radius {}: must be positive",
                self.radius.value()
            )));
        }
        Ok(())
    }

    /// ADQL of the search, nearest rows first.
    pub fn to_adql(&self) -> TapResult<String> {
        self.validate()?;
        let (ra, dec) = (self.ra.value(), self.dec.value());
        Ok(format!(
            "SELECT DISTANCE(POINT('ICRS',{rc},{dc}), POINT('ICRS',{ra},{dec})) AS dist, {cols} \
             FROM {table} WHERE CONTAINS(POINT('ICRS',{rc},{dc}),\
             CIRCLE('ICRS',{ra},{dec}, {radius}))=1 ORDER BY dist ASC",
            rc = self.ra_column,
            dc = self.dec_column,
            cols = select_list(&self.columns),
            table = self.table,
            radius = self.radius.value(),
        ))
    }
}

/// Rectangular search around a position.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSearch {
    pub table: String,
    pub ra_column: String,
    pub dec_column: String,
    pub ra: Degrees,
    pub dec: Degrees,
    pub width: Degrees,
    pub height: Degrees,
    pub columns: Vec<String>,
}

impl BoxSearch {
    pub fn new(
        table: impl Into<String>,
        ra: Degrees,
        dec: Degrees,
        width: Degrees,
        height: Degrees,
    ) -> Self {
        Self {
            table: table.into(),
            ra_column: "ra".to_string(),
            dec_column: "dec".to_string(),
            ra,
            dec,
            width,
            height,
            columns: Vec::new(),
        }
    }

    pub fn with_position_columns(
        mut self,
        ra_column: impl Into<String>,
        dec_column: impl Into<String>,
    ) -> Self {
        self.ra_column = ra_column.into();
        self.dec_column = dec_column.into();
        self
    }

    pub fn to_adql(&self) -> TapResult<String> {
        if self.table.trim().is_empty() {
            return Err(TapError::invalid_argument("Table name is mandatory"));
        }
        validate_position(self.ra, self.dec)?;
        if !(self.width.value() > 0.0 && self.height.value() > 0.0) {
            return Err(TapError::invalid_argument(
                "Box width and height must be positive",
            ));
        }
        let (ra, dec) = (self.ra.value(), self.dec.value());
        Ok(format!(
            "SELECT DISTANCE(POINT('ICRS',{rc},{dc}), POINT('ICRS',{ra},{dec})) AS dist, {cols} \
             FROM {table} WHERE CONTAINS(POINT('ICRS',{rc},{dc}),\
             BOX('ICRS',{ra},{dec}, {w}, {h}))=1 ORDER BY dist ASC",
            rc = self.ra_column,
            dc = self.dec_column,
            cols = select_list(&self.columns),
            table = self.table,
            w = self.width.value(),
            h = self.height.value(),
        ))
    }
}

fn select_list(columns: &[String]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    }
}

/// Positional cross-match between two user tables, stored in `results_table`.
pub fn cross_match_query(
    table_a: &str,
    table_b: &str,
    results_table: &str,
    radius: Arcseconds,
) -> TapResult<String> {
    if table_a.trim().is_empty() {
        return Err(TapError::invalid_argument("Table name A argument is mandatory"));
    }
    let (schema_a, name_a) = split_qualified_name(table_a);
    let schema_a = schema_a.ok_or_else(|| {
        TapError::invalid_argument(format!(
            "Not found schema name in full qualified table A: '{}'",
            table_a
        ))
    })?;

    if table_b.trim().is_empty() {
        return Err(TapError::invalid_argument("Table name B argument is mandatory"));
    }
    let (schema_b, name_b) = split_qualified_name(table_b);
    let schema_b = schema_b.ok_or_else(|| {
        TapError::invalid_argument(format!(
            "Not found schema name in full qualified table B: '{}'",
            table_b
        ))
    })?;

    if results_table.trim().is_empty() {
        return Err(TapError::invalid_argument(
            "Results table name argument is mandatory",
        ));
    }
    if split_qualified_name(results_table).0.is_some() {
        return Err(TapError::invalid_argument(
            "Please, do not specify schema for 'results_table_name'",
        ));
    }

    let r = radius.value();
    if !(MIN_CROSSMATCH_RADIUS_ARCSEC..=MAX_CROSSMATCH_RADIUS_ARCSEC).contains(&r) {
        return Err(TapError::invalid_argument(format!(
            "Invalid radius value. Found {}, valid range is: {} to {}",
            r, MIN_CROSSMATCH_RADIUS_ARCSEC, MAX_CROSSMATCH_RADIUS_ARCSEC
        )));
    }

    Ok(format!(
        "SELECT crossmatch_positional('{}','{}','{}','{}',{:?},'{}') FROM dual;",
        schema_a, name_a, schema_b, name_b, r, results_table
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_set_top() {
        assert_eq!(
            set_top_in_query("SELECT * FROM t", 2000),
            "SELECT TOP 2000 * FROM t"
        );
        assert_eq!(
            set_top_in_query("select distinct a FROM t", 5),
            "select distinct TOP 5 a FROM t"
        );
        assert_eq!(
            set_top_in_query("SELECT TOP 10 * FROM t", 2000),
            "SELECT TOP 10 * FROM t"
        );
        assert_eq!(set_top_in_query("DELETE FROM t", 10), "DELETE FROM t");
    }

    #[test]
    fn test_set_top_ignores_words_inside_identifiers_and_literals() {
        assert_eq!(
            set_top_in_query("SELECT stop_time FROM t WHERE s = 'TOP'", 3),
            "SELECT TOP 3 stop_time FROM t WHERE s = 'TOP'"
        );
    }

    #[test]
    fn test_split_qualified_name() {
        assert_eq!(split_qualified_name("gaiadr2.gaia_source"), (Some("gaiadr2"), "gaia_source"));
        assert_eq!(split_qualified_name("dual"), (None, "dual"));
        assert_eq!(split_qualified_name(".dual"), (None, "dual"));
    }

    #[test]
    fn test_cone_search_query() {
        let cone = ConeSearch::new(
            "gaiadr2.gaia_source",
            Degrees::new(19.0),
            Degrees::new(20.0),
            Degrees::new(0.5),
        );
        assert_eq!(
            cone.to_adql().unwrap(),
            "SELECT DISTANCE(POINT('ICRS',ra,dec), POINT('ICRS',19,20)) AS dist, * \
             FROM gaiadr2.gaia_source WHERE CONTAINS(POINT('ICRS',ra,dec),\
             CIRCLE('ICRS',19,20, 0.5))=1 ORDER BY dist ASC"
        );
    }

    #[test]
    fn test_cone_search_columns_and_validation() {
        let cone = ConeSearch::new("t", Degrees::new(1.5), Degrees::new(-2.0), Degrees::new(0.1))
            .with_position_columns("alpha", "delta")
            .with_columns(["source_id", "phot_g_mean_mag"]);
        let adql = cone.to_adql().unwrap();
        assert!(adql.contains("AS dist, source_id, phot_g_mean_mag FROM t"));
        assert!(adql.contains("POINT('ICRS',alpha,delta)"));

        let bad = ConeSearch::new("t", Degrees::new(0.0), Degrees::new(95.0), Degrees::new(1.0));
        assert!(bad.to_adql().is_err());
        let bad = ConeSearch::new("t", Degrees::new(0.0), Degrees::new(0.0), Degrees::new(0.0));
        assert!(bad.to_adql().is_err());
    }

    #[test]
    fn test_box_search_query() {
        let search = BoxSearch::new(
            "gaiadr2.gaia_source",
            Degrees::new(19.0),
            Degrees::new(20.0),
            Degrees::new(0.1),
            Degrees::new(0.2),
        );
        let adql = search.to_adql().unwrap();
        assert!(adql.contains("BOX('ICRS',19,20, 0.1, 0.2))=1 ORDER BY dist ASC"));
    }

    #[test]
    fn test_cross_match_query() {
        let q = cross_match_query(
            "schemaA.tableA",
            "schemaB.tableB",
            "results",
            Arcseconds::new(1.0),
        )
        .unwrap();
        assert_eq!(
            q,
            "SELECT crossmatch_positional('schemaA','tableA','schemaB','tableB',1.0,'results') FROM dual;"
        );
    }

    #[test]
    fn test_cross_match_validation() {
        let r = Arcseconds::new(1.0);
        let msg = |res: TapResult<String>| res.unwrap_err().to_string();
        assert!(msg(cross_match_query("", "s.b", "r", r)).contains("Table name A argument is mandatory"));
        assert!(msg(cross_match_query("tableA", "s.b", "r", r))
            .contains("Not found schema name in full qualified table A: 'tableA'"));
        assert!(msg(cross_match_query("s.a", "", "r", r)).contains("Table name B argument is mandatory"));
        assert!(msg(cross_match_query("s.a", "tableB", "r", r))
            .contains("Not found schema name in full qualified table B: 'tableB'"));
        assert!(msg(cross_match_query("s.a", "s.b", "", r))
            .contains("Results table name argument is mandatory"));
        assert!(msg(cross_match_query("s.a", "s.b", "s.r", r))
            .contains("Please, do not specify schema for 'results_table_name'"));
        assert!(msg(cross_match_query("s.a", "s.b", "r", Arcseconds::new(0.01)))
            .contains("Invalid radius value. Found 0.01, valid range is: 0.1 to 10"));
        assert!(cross_match_query("s.a", "s.b", "r", Arcseconds::new(10.0)).is_ok());
    }

    proptest! {
        #[test]
        fn prop_set_top_is_idempotent(col in "c_[a-z_]{0,10}", top in 1u64..100_000) {
            let query = format!("SELECT {} FROM tab", col);
            let once = set_top_in_query(&query, top);
            prop_assert_eq!(set_top_in_query(&once, top + 1), once.clone());
            let expected = format!("TOP {}", top);
            prop_assert_eq!(once.matches(&expected).count(), 1);
        }
    }
}
