// ABOUTME: Integration tests for validated catalog names.
// ABOUTME: Tests parsing, validation, ordering, and serde behavior of phantom-typed names.

use rigging::types::*;
use std::collections::{BTreeSet, HashMap};

mod validation {
    use super::*;

    #[test]
    fn accepts_typical_names() {
        for name in ["db", "dev_gcp_project", "zone-1", "host.internal", "a:b"] {
            assert!(ResourceName::new(name).is_ok(), "{}", name);
        }
        assert!(TypeName::new("unfurl.nodes.DNSZone").is_ok());
    }

    #[test]
    fn empty_name_returns_error() {
        assert_eq!(RequirementName::new(""), Err(NameError::Empty));
    }

    #[test]
    fn leading_punctuation_returns_error() {
        assert_eq!(TypeName::new(".hidden"), Err(NameError::InvalidStart('.')));
        assert_eq!(
            DeploymentName::new("_site"),
            Err(NameError::InvalidStart('_'))
        );
    }

    #[test]
    fn whitespace_and_slashes_are_rejected() {
        assert_eq!(ResourceName::new("a b"), Err(NameError::InvalidChar(' ')));
        assert_eq!(ResourceName::new("a/b"), Err(NameError::InvalidChar('/')));
    }

    #[test]
    fn overlong_name_returns_error() {
        let long = "x".repeat(254);
        assert_eq!(ResourceName::new(&long), Err(NameError::TooLong));
        assert!(ResourceName::new(&long[..253]).is_ok());
    }

    #[test]
    fn parse_via_from_str() {
        let name: ResourceName = "app".parse().unwrap();
        assert_eq!(name.as_str(), "app");
        assert_eq!(name.to_string(), "app");
        assert_eq!(name.into_inner(), "app".to_string());
    }
}

mod behavior {
    use super::*;

    #[test]
    fn names_order_lexically() {
        let set: BTreeSet<ResourceName> = ["zone", "app", "db"]
            .into_iter()
            .map(|n| ResourceName::new(n).unwrap())
            .collect();
        let ordered: Vec<&str> = set.iter().map(|n| n.as_str()).collect();
        assert_eq!(ordered, vec!["app", "db", "zone"]);
    }

    #[test]
    fn hash_map_lookup_by_str() {
        let mut map: HashMap<TypeName, u32> = HashMap::new();
        map.insert(TypeName::new("compute").unwrap(), 7);
        assert_eq!(map.get("compute"), Some(&7));
        assert_eq!(map.get("dns"), None);
    }

    #[test]
    fn serde_round_trip_as_plain_string() {
        let name = DeploymentName::new("site").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"site\"");
        let back: DeploymentName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn deserialize_rejects_invalid() {
        let result: Result<ResourceName, _> = serde_yaml::from_str("\"-bad\"");
        assert!(result.is_err());
    }
}
