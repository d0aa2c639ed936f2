//! Queries to Earth System Grid Federation (ESGF) index nodes.
//!
//! ESGF nodes expose a search API (see the
//! [ESGF search documentation](https://esgf.github.io/esg-search/ESGF_Search_RESTful_API.html))
//! with two endpoints used here: `search`, which returns the matching records
//! as JSON or XML, and `wget`, which returns a shell script that downloads
//! the matching files. This module only builds the URLs; fetching them is
//! left to the caller.
//!
//! Useful criteria include:
//!
//! - `ensemble` (e.g. r1i1p1),
//! - `experiment` (e.g. historical),
//! - `model`,
//! - `project` (e.g. CMIP5),
//! - `product` (e.g. output1),
//! - `realm` (e.g. seaIce),
//! - `time_frequency` (e.g. mon),
//! - `variable` and `variable_long_name`.
//!
//! Other useful parameters are `latest` and `replica` (booleans), `type`
//! (File, Dataset or Aggregation), `format` (application/solr+json or
//! application/solr+xml) and `start`/`end` (temporal limits given as
//! "YYYY-MM-DDTHH:mm:ssZ").
use std::sync::OnceLock;

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;

use crate::error::EsgError;

pub const DEFAULT_ESG_NODE: &str = "http://pcmdi9.llnl.gov/";

static WGET_FILE_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// The value of one query criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CriterionValue {
    Str(String),
    /// Written as "true" or "false"
    Bool(bool),
    /// Each value is written as a separate criterion with the same name,
    /// which the search service treats as OR.
    List(Vec<String>),
}

impl CriterionValue {
    fn values(&self) -> Vec<String> {
        match self {
            CriterionValue::Str(s) => vec![s.clone()],
            CriterionValue::Bool(b) => vec![b.to_string()],
            CriterionValue::List(l) => l.clone(),
        }
    }
}

impl From<&str> for CriterionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CriterionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for CriterionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for CriterionValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for CriterionValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(|s| s.to_string()).collect())
    }
}

/// Which ESGF service a query is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Endpoint {
    /// Search for datasets, returned as Solr JSON by default
    Search,
    /// Search for aggregations (this endpoint does not appear to be well supported by ESGF nodes)
    Aggregation,
    /// Get a wget script that downloads the matching files
    Wget,
}

impl Endpoint {
    fn service(&self) -> &'static str {
        match self {
            Endpoint::Search | Endpoint::Aggregation => "search",
            Endpoint::Wget => "wget",
        }
    }

    /// Criteria added to every query for this endpoint unless given explicitly.
    pub fn default_criteria(&self) -> Vec<(&'static str, CriterionValue)> {
        let mut criteria = vec![("latest", true.into()), ("replica", false.into())];
        match self {
            Endpoint::Search => {
                criteria.push(("type", "Dataset".into()));
                criteria.push(("format", "application/solr+json".into()));
            }
            Endpoint::Aggregation => criteria.push(("type", "Aggregation".into())),
            Endpoint::Wget => (),
        }
        criteria
    }
}

/// A set of search criteria, kept in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    criteria: IndexMap<String, CriterionValue>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a criterion.
    pub fn criterion<K: ToString, V: Into<CriterionValue>>(mut self, key: K, value: V) -> Self {
        self.criteria.insert(key.to_string(), value.into());
        self
    }

    /// Add a criterion given as "key=value". "true" and "false" become
    /// booleans and comma-separated values become OR criteria. Giving the same
    /// key more than once also adds OR criteria.
    pub fn add_criterion_str(&mut self, s: &str) -> Result<(), EsgError> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| EsgError::BadCriterion(s.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(EsgError::EmptyCriterion);
        }

        let value = match value {
            "true" => CriterionValue::Bool(true),
            "false" => CriterionValue::Bool(false),
            v if v.contains(',') => v.split(',').map(|p| p.trim()).collect_vec().into(),
            v => v.into(),
        };

        let value = match self.criteria.shift_remove(key) {
            Some(prev) => {
                let mut values = prev.values();
                values.extend(value.values());
                CriterionValue::List(values)
            }
            None => value,
        };
        self.criteria.insert(key.to_string(), value);
        Ok(())
    }

    /// The `key=value` pairs sent for `endpoint`: the explicit criteria in
    /// order, followed by the endpoint defaults not given explicitly.
    pub fn query_pairs(&self, endpoint: Endpoint) -> Vec<String> {
        let mut criteria = self.criteria.clone();
        for (key, value) in endpoint.default_criteria() {
            criteria.entry(key.to_string()).or_insert(value);
        }

        criteria
            .iter()
            .flat_map(|(key, value)| {
                value.values().into_iter().map(move |v| format!("{key}={}", quote(&v)))
            })
            .collect()
    }

    /// The full URL for this query against the ESGF index `node`.
    pub fn url(&self, node: &str, endpoint: Endpoint) -> String {
        let sep = if node.ends_with('/') { "" } else { "/" };
        format!(
            "{node}{sep}esg-search/{}?{}",
            endpoint.service(),
            self.query_pairs(endpoint).join("&")
        )
    }

    pub fn search_url(&self, node: &str) -> String {
        self.url(node, Endpoint::Search)
    }

    pub fn aggregation_url(&self, node: &str) -> String {
        self.url(node, Endpoint::Aggregation)
    }

    pub fn wget_url(&self, node: &str) -> String {
        self.url(node, Endpoint::Wget)
    }
}

/// Percent-encode a query value, leaving ASCII letters, digits, "_.-" and
/// "/" as they are.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b'/') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

fn check_date_limit(limit: &str) -> Result<u32, EsgError> {
    if limit.len() != 6 {
        return Err(EsgError::BadDateLimit(limit.to_string()));
    }
    limit
        .parse()
        .map_err(|_| EsgError::BadDateLimit(limit.to_string()))
}

/// Remove the files from an ESGF wget script that lie entirely outside the
/// period from `start` to `end`.
///
/// `start` and `end` are given as "YYYYMM". A file is removed if its period
/// ends at or before `start` or starts at or after `end`. Lines that do not
/// list a CMIP5 file with a period are kept as they are.
pub fn prune_wget(script: &str, start: Option<&str>, end: Option<&str>) -> Result<String, EsgError> {
    let start = check_date_limit(start.unwrap_or("000000"))?;
    let end = check_date_limit(end.unwrap_or("999999"))?;

    let re = WGET_FILE_REGEX.get_or_init(|| {
        regex::Regex::new(r"^'(?-u:\w)+_(?-u:\w)+_.+_(?-u:\w)+_(?-u:\w)+_(?<fstart>[0-9]{6})-(?<fend>[0-9]{6})\.nc' ")
            .expect("WGET_FILE_REGEX should compile")
    });

    let mut out = vec![];
    for line in script.lines() {
        if let Some((fstart, fend)) = re.captures(line).and_then(|caps| {
            let fstart: u32 = caps["fstart"].parse().ok()?;
            let fend: u32 = caps["fend"].parse().ok()?;
            Some((fstart, fend))
        }) {
            if fend <= start || fstart >= end {
                continue;
            }
            debug!("Keeping file covering {fstart}-{fend}");
        }
        out.push(line);
    }

    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_search_url() {
        let query = SearchQuery::new()
            .criterion("project", "CMIP5")
            .criterion("variable", "tas")
            .criterion("time_frequency", "mon")
            .criterion("experiment", "rcp85");
        assert_eq!(
            query.search_url(DEFAULT_ESG_NODE),
            "http://pcmdi9.llnl.gov/esg-search/search?project=CMIP5&variable=tas&time_frequency=mon&experiment=rcp85&latest=true&replica=false&type=Dataset&format=application/solr%2Bjson"
        );
    }

    #[test]
    fn test_or_criteria_and_overrides() {
        let query = SearchQuery::new()
            .criterion("model", vec!["CCSM4", "HadGEM2-ES"])
            .criterion("latest", false);
        assert_eq!(
            query.wget_url("http://esgf-node.llnl.gov"),
            "http://esgf-node.llnl.gov/esg-search/wget?model=CCSM4&model=HadGEM2-ES&latest=false&replica=false"
        );
    }

    #[test]
    fn test_aggregation_url() {
        let url = SearchQuery::new().criterion("variable", "sic").aggregation_url(DEFAULT_ESG_NODE);
        assert!(url.starts_with("http://pcmdi9.llnl.gov/esg-search/search?variable=sic&"));
        assert!(url.ends_with("type=Aggregation"));
    }

    #[rstest]
    #[case("sea ice", "sea%20ice")]
    #[case("a/b_c.d-e", "a/b_c.d-e")]
    #[case("x&y=z", "x%26y%3Dz")]
    fn test_quote(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote(input), expected);
    }

    #[test]
    fn test_criterion_strings() {
        let mut query = SearchQuery::new();
        query.add_criterion_str("model=CCSM4").unwrap();
        query.add_criterion_str("model=MIROC5,CanESM2").unwrap();
        query.add_criterion_str("replica=true").unwrap();

        let pairs = query.query_pairs(Endpoint::Wget);
        assert_eq!(
            pairs,
            vec!["model=CCSM4", "model=MIROC5", "model=CanESM2", "replica=true", "latest=true"]
        );

        assert!(matches!(query.add_criterion_str("model"), Err(EsgError::BadCriterion(_))));
        assert!(matches!(query.add_criterion_str("=x"), Err(EsgError::EmptyCriterion)));
    }

    #[test]
    fn test_endpoint_names() {
        assert_eq!("wget".parse::<Endpoint>().unwrap(), Endpoint::Wget);
        assert_eq!(Endpoint::Aggregation.to_string(), "aggregation");
    }

    #[test]
    fn test_prune_wget() {
        let script = "#!/bin/bash\n\
            'tas_Amon_CCSM4_rcp85_r1i1p1_200601-205012.nc' 'http://a/tas1.nc' 'MD5' 'abc'\n\
            'tas_Amon_CCSM4_rcp85_r1i1p1_205101-210012.nc' 'http://a/tas2.nc' 'MD5' 'def'\n\
            'tas_Amon_CCSM4_rcp85_r1i1p1_210101-230012.nc' 'http://a/tas3.nc' 'MD5' 'ghi'\n\
            EOF--dataset.file.url.chksum_type.chksum";

        let pruned = prune_wget(script, Some("205501"), Some("210101")).unwrap();
        let lines: Vec<_> = pruned.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#!/bin/bash");
        assert!(lines[1].contains("205101-210012"));
        assert_eq!(lines[2], "EOF--dataset.file.url.chksum_type.chksum");

        let unpruned = prune_wget(script, None, None).unwrap();
        assert_eq!(unpruned, script);
    }

    #[test]
    fn test_prune_wget_keeps_non_ascii_periods() {
        // Only ASCII digits count as a period, anything else is passed through
        let script = "'tas_Amon_CCSM4_rcp85_r1i1p1_\u{662}\u{660}\u{660}\u{666}\u{660}\u{661}-\u{662}\u{661}\u{660}\u{660}\u{661}\u{662}.nc' 'http://a/tas.nc' 'MD5' 'abc'";
        let pruned = prune_wget(script, None, None).unwrap();
        assert_eq!(pruned, script);
    }

    #[test]
    fn test_prune_wget_bad_limit() {
        assert!(matches!(prune_wget("", Some("2005"), None), Err(EsgError::BadDateLimit(_))));
    }
}
