//! Small utilities shared by resource and data-source handlers.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::ProviderError;

/// Separator for `<a>#<b>` composite IDs.
pub const FIELD_SEP: &str = "#";

/// Separator for route entry IDs (`<entry_id>.<route_table_id>`).
pub const ROUTE_SEP: &str = ".";

/// Separator for EIP association IDs.
pub const EIP_ASSOCIATION_SEP: &str = "::";

/// Separator for ENI attachment IDs (`<eni_id>+<instance_id>`).
pub const ENI_ATTACHMENT_SEP: &str = "+";

/// Join the parts of a composite ID.
pub fn join_id(parts: &[&str], sep: &str) -> String {
    parts.join(sep)
}

/// Split a composite ID into exactly `expected` non-empty parts.
pub fn split_id<'a>(id: &'a str, sep: &str, expected: usize) -> Result<Vec<&'a str>, ProviderError> {
    let parts: Vec<&str> = id.split(sep).collect();
    if parts.len() != expected || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::InvalidRequest(format!(
            "id `{}` is broken: expected {} parts separated by `{}`",
            id, expected, sep
        )));
    }
    Ok(parts)
}

/// Stable ID for a data-source result: CRC-32 of the IDs, each followed by `-`.
pub fn data_resource_ids_hash<S: AsRef<str>>(ids: &[S]) -> String {
    let mut hasher = crc32fast::Hasher::new();
    for id in ids {
        hasher.update(id.as_ref().as_bytes());
        hasher.update(b"-");
    }
    hasher.finalize().to_string()
}

/// Resource name understood by the tag API.
pub fn build_tag_resource_name(service: &str, resource_type: &str, region: &str, id: &str) -> String {
    format!("qcs::{}:{}:uin/:{}/{}", service, region, resource_type, id)
}

/// Tags to replace and tag keys to delete to go from `old` to `new`.
pub fn diff_tags(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let replace = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let delete = old
        .keys()
        .filter(|k| !new.contains_key(*k))
        .cloned()
        .collect();
    (replace, delete)
}

/// Write a data-source result as pretty JSON.
pub async fn write_to_file(path: impl AsRef<Path>, value: &serde_json::Value) -> Result<(), ProviderError> {
    let path = path.as_ref();
    let contents = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, contents).await?;
    info!(path = %path.display(), "wrote data source result");
    Ok(())
}

static PORT_EXPRESSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d{1,5},)*\d{1,5}$|^\d{1,5}-\d{1,5}$").ok());

/// Whether `value` is a port (`53`), a port list (`80,443`) or a range (`80-90`).
pub fn is_port_expression(value: &str) -> bool {
    PORT_EXPRESSION
        .as_ref()
        .is_some_and(|re| re.is_match(value))
}

/// Parse `value` as an IPv4/IPv6 address or CIDR block.
pub fn is_ip_or_cidr(value: &str) -> bool {
    value.parse::<std::net::IpAddr>().is_ok() || is_cidr(value)
}

/// Parse `value` as a CIDR block such as `10.0.0.0/16`.
pub fn is_cidr(value: &str) -> bool {
    let Some((addr, prefix)) = value.split_once('/') else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match addr.parse::<std::net::IpAddr>() {
        Ok(std::net::IpAddr::V4(_)) => prefix <= 32,
        Ok(std::net::IpAddr::V6(_)) => prefix <= 128,
        Err(_) => {
            debug!(value, "not a CIDR block");
            false
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_join_round_trip() {
        let id = join_id(&["12345", "rtb-abc"], ROUTE_SEP);
        assert_eq!(id, "12345.rtb-abc");
        assert_eq!(split_id(&id, ROUTE_SEP, 2).unwrap(), vec!["12345", "rtb-abc"]);

        let id = join_id(&["eip-1", "eni-1", "10.0.0.5"], EIP_ASSOCIATION_SEP);
        assert_eq!(id, "eip-1::eni-1::10.0.0.5");
        assert_eq!(split_id(&id, EIP_ASSOCIATION_SEP, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_split_id_rejects_broken_ids() {
        assert!(split_id("eni-1", ENI_ATTACHMENT_SEP, 2).is_err());
        assert!(split_id("eni-1+", ENI_ATTACHMENT_SEP, 2).is_err());
        assert!(split_id("a+b+c", ENI_ATTACHMENT_SEP, 2).is_err());
    }

    #[test]
    fn test_ids_hash_is_stable_and_order_sensitive() {
        let a = data_resource_ids_hash(&["vpc-1", "vpc-2"]);
        let b = data_resource_ids_hash(&["vpc-2", "vpc-1"]);
        assert_eq!(a, data_resource_ids_hash(&["vpc-1", "vpc-2"]));
        assert_ne!(a, b);
        assert!(a.parse::<u32>().is_ok());
    }

    #[test]
    fn test_ids_hash_matches_crc32_of_joined_ids() {
        let expected = crc32fast::hash(b"vpc-1-vpc-2-").to_string();
        assert_eq!(data_resource_ids_hash(&["vpc-1", "vpc-2"]), expected);
        assert_eq!(data_resource_ids_hash::<&str>(&[]), "0");
    }

    #[test]
    fn test_tag_resource_name() {
        assert_eq!(
            build_tag_resource_name("vpc", "vpc", "ap-guangzhou", "vpc-123"),
            "qcs::vpc:ap-guangzhou:uin/:vpc/vpc-123"
        );
    }

    #[test]
    fn test_diff_tags() {
        let old: BTreeMap<String, String> = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let new: BTreeMap<String, String> = [("b", "3"), ("c", "4")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let (replace, delete) = diff_tags(&old, &new);
        assert_eq!(replace.len(), 2);
        assert_eq!(replace["b"], "3");
        assert_eq!(replace["c"], "4");
        assert_eq!(delete, vec!["a".to_string()]);
    }

    #[test]
    fn test_cidr_parsing() {
        assert!(is_cidr("10.0.0.0/16"));
        assert!(is_cidr("2402:4e00::/56"));
        assert!(!is_cidr("10.0.0.0/33"));
        assert!(!is_cidr("10.0.0.0"));
        assert!(is_ip_or_cidr("8.8.8.8"));
        assert!(!is_ip_or_cidr("not-an-ip"));
    }

    #[test]
    fn test_port_expression() {
        assert!(is_port_expression("53"));
        assert!(is_port_expression("80,443,8080"));
        assert!(is_port_expression("80-90"));
        assert!(!is_port_expression("ALL"));
        assert!(!is_port_expression("80-90,100"));
        assert!(!is_port_expression("123456"));
    }

    #[tokio::test]
    async fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        tokio_test::assert_ok!(write_to_file(&path, &serde_json::json!({"ids": ["vpc-1"]})).await);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"vpc-1\""));
        assert!(contents.contains('\n'));
    }
}
