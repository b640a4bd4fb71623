//! Catalog URN builders

/// Platform identifier used in every URN
pub const PLATFORM: &str = "ravendb";

const INSTANCE_URN_PREFIX: &str = "urn:li:dataPlatformInstance";

pub fn data_platform_urn(platform: &str) -> String {
    format!("urn:li:dataPlatform:{}", platform)
}

/// URN of a platform instance; an instance that already is a URN is kept
pub fn platform_instance_urn(platform: &str, instance: &str) -> String {
    if instance.starts_with(INSTANCE_URN_PREFIX) {
        instance.to_string()
    } else {
        format!(
            "{}:({},{})",
            INSTANCE_URN_PREFIX,
            data_platform_urn(platform),
            instance
        )
    }
}

pub fn dataset_urn(platform: &str, name: &str, env: &str) -> String {
    format!("urn:li:dataset:({},{},{})", data_platform_urn(platform), name, env)
}

/// `<database>.<collection>`
pub fn dataset_name(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_urn() {
        assert_eq!(
            dataset_urn(PLATFORM, &dataset_name("shop", "Products"), "PROD"),
            "urn:li:dataset:(urn:li:dataPlatform:ravendb,shop.Products,PROD)"
        );
    }

    #[test]
    fn test_platform_instance_urn() {
        let urn = platform_instance_urn(PLATFORM, "shop");
        assert_eq!(
            urn,
            "urn:li:dataPlatformInstance:(urn:li:dataPlatform:ravendb,shop)"
        );
        assert_eq!(platform_instance_urn(PLATFORM, &urn), urn);
    }
}
