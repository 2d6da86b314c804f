use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::cmp::Ordering;

use crate::http::HttpClient;

/// Version manifest published next to the releases
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UpdateInfo {
    pub version: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Returns the manifest when it advertises a version newer than `current`
pub fn check_for_update(
    http: &dyn HttpClient,
    manifest_url: &str,
    current: &str,
) -> Result<Option<UpdateInfo>> {
    let resp = http.get(manifest_url, &[])?;
    if !resp.is_success() {
        return Err(anyhow!("update check failed: HTTP {}", resp.status));
    }
    let info: UpdateInfo = serde_json::from_slice(&resp.body)?;
    if compare_versions(&info.version, current) == Ordering::Greater {
        Ok(Some(info))
    } else {
        Ok(None)
    }
}

/// Compare dotted numeric versions; missing or non-numeric parts count as 0
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.trim()
            .trim_start_matches('v')
            .split('.')
            .map(|p| {
                p.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
