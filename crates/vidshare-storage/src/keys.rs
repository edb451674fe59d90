//! Key and bucket validation shared by the storage backends.

use crate::traits::{StorageError, StorageResult};

pub fn validate_bucket(bucket: &str) -> StorageResult<()> {
    if bucket.is_empty()
        || bucket.contains('/')
        || bucket.contains('\\')
        || bucket.contains("..")
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid bucket name: {:?}",
            bucket
        )));
    }
    Ok(())
}

pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!("Invalid storage key: {:?}", key)));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains an empty or relative segment: {:?}",
            key
        )));
    }
    Ok(())
}

/// Location string reported back to callers: `{bucket}/{key}`.
pub fn object_location(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        assert!(validate_key("u1/v1/720p/720p_000.ts").is_ok());
        assert!(validate_bucket("private").is_ok());
    }

    #[test]
    fn rejects_escaping_keys() {
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("u1/../../etc").is_err());
        assert!(validate_key("u1//v1").is_err());
        assert!(validate_bucket("a/b").is_err());
        assert!(validate_bucket("..").is_err());
    }
}
