//! # Region Catalog
//!
//! The server ships the region catalog as two parallel delimiter-encoded
//! strings (keys and display labels). The outer separator is `,`; a literal
//! comma inside a value is escaped as `#`. Square brackets from legacy
//! renderings are ignored.

use crate::config::{ConnectionConfig, RegionCatalog};
use crate::fields::OptionItem;

/// Decode one delimiter-encoded list. Empty input decodes to an empty list.
pub fn split_encoded_list(serialized: &str) -> Vec<String> {
    if serialized.is_empty() {
        return Vec::new();
    }

    serialized
        .chars()
        .filter(|c| *c != '[' && *c != ']')
        .collect::<String>()
        .split(',')
        .map(|entry| entry.trim().replace('#', ","))
        .collect()
}

/// Encode a list back into the delimiter form. Empty lists encode to `None`
/// (the server renders an absent attribute, not an empty string).
pub fn join_encoded_list(entries: &[String]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    Some(
        entries
            .iter()
            .map(|entry| entry.trim().replace(',', "#"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// Pair up region keys with their labels. A missing label falls back to the
/// key so a truncated catalog still renders selectable entries.
pub fn region_options(catalog: &RegionCatalog) -> Vec<OptionItem> {
    let keys = split_encoded_list(&catalog.all_region_keys);
    let labels = split_encoded_list(&catalog.all_region_values);

    keys.into_iter()
        .enumerate()
        .map(|(index, key)| {
            let label = labels.get(index).cloned().unwrap_or_else(|| key.clone());
            OptionItem { key, label }
        })
        .collect()
}

/// The region selected at form initialization: the configured region, else
/// the server default, else the first catalog entry.
pub fn initial_region(config: &ConnectionConfig, options: &[OptionItem]) -> Option<OptionItem> {
    let wanted = if config.region.is_empty() {
        &config.default_region
    } else {
        &config.region
    };

    options
        .iter()
        .find(|option| option.key == *wanted)
        .or_else(|| options.first())
        .cloned()
}

/// Regional STS endpoint. China-partition regions live under a different
/// top-level domain.
pub fn sts_endpoint_for_region(region_key: &str) -> String {
    if region_key.starts_with("cn") {
        format!("https://sts.{region_key}.amazonaws.com.cn")
    } else {
        format!("https://sts.{region_key}.amazonaws.com")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_unescapes_hash_to_comma() {
        let entries = split_encoded_list("us-east-1,eu#west,ap-south-1");
        assert_eq!(entries, vec!["us-east-1", "eu,west", "ap-south-1"]);
    }

    #[test]
    fn test_split_ignores_brackets_and_whitespace() {
        let entries = split_encoded_list("[us-east-1, eu-west-1]");
        assert_eq!(entries, vec!["us-east-1", "eu-west-1"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_encoded_list("").is_empty());
    }

    #[test]
    fn test_join_empty_is_none() {
        assert_eq!(join_encoded_list(&[]), None);
    }

    #[test]
    fn test_round_trip_with_escaped_commas() {
        let serialized = "us-east-1,N. Virginia#VA,eu-west-1";
        let entries = split_encoded_list(serialized);
        assert_eq!(join_encoded_list(&entries).as_deref(), Some(serialized));
    }

    #[test]
    fn test_region_options_pair_keys_with_labels() {
        let catalog = RegionCatalog {
            all_region_keys: "us-east-1,eu-west-1".to_string(),
            all_region_values: "US East (N. Virginia)#VA,EU (Ireland)".to_string(),
        };

        let options = region_options(&catalog);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].key, "us-east-1");
        assert_eq!(options[0].label, "US East (N. Virginia),VA");
        assert_eq!(options[1].label, "EU (Ireland)");
    }

    #[test]
    fn test_region_options_missing_label_falls_back_to_key() {
        let catalog = RegionCatalog {
            all_region_keys: "us-east-1,eu-west-1".to_string(),
            all_region_values: "US East".to_string(),
        };

        let options = region_options(&catalog);
        assert_eq!(options[1].label, "eu-west-1");
    }

    #[test]
    fn test_initial_region_prefers_config_then_default_then_first() {
        let catalog = RegionCatalog {
            all_region_keys: "us-east-1,eu-west-1,ap-south-1".to_string(),
            all_region_values: "a,b,c".to_string(),
        };
        let options = region_options(&catalog);

        let mut config = ConnectionConfig {
            region: "eu-west-1".to_string(),
            default_region: "ap-south-1".to_string(),
            ..ConnectionConfig::default()
        };
        assert_eq!(
            initial_region(&config, &options).map(|o| o.key),
            Some("eu-west-1".to_string())
        );

        config.region.clear();
        assert_eq!(
            initial_region(&config, &options).map(|o| o.key),
            Some("ap-south-1".to_string())
        );

        config.default_region = "nowhere-1".to_string();
        assert_eq!(
            initial_region(&config, &options).map(|o| o.key),
            Some("us-east-1".to_string())
        );
    }

    #[test]
    fn test_sts_endpoint_china_partition() {
        assert_eq!(
            sts_endpoint_for_region("us-east-1"),
            "https://sts.us-east-1.amazonaws.com"
        );
        assert_eq!(
            sts_endpoint_for_region("cn-north-1"),
            "https://sts.cn-north-1.amazonaws.com.cn"
        );
    }
}
