// ABOUTME: Integration and property tests for readiness normalization.
// ABOUTME: Tests that status mapping is total and that the error and absent rules always hold.

use proptest::prelude::*;
use rigging::OrchestratorConfig;
use rigging::readiness::*;
use rigging::types::TypeName;

fn compute() -> TypeName {
    TypeName::new("compute").unwrap()
}

mod mapping {
    use super::*;

    #[test]
    fn synonyms_map_to_canonical_states() {
        let mapper = ReadinessStateMapper::default();
        assert_eq!(mapper.map(&compute(), "running", false), ReadinessState::Started);
        assert_eq!(mapper.map(&compute(), "Exited", false), ReadinessState::Stopped);
        assert_eq!(mapper.map(&compute(), "healthy", false), ReadinessState::Ok);
        assert_eq!(mapper.map(&compute(), "terminated", false), ReadinessState::Deleted);
    }

    #[test]
    fn empty_status_is_pending() {
        let mapper = ReadinessStateMapper::default();
        let mapped = mapper.map_detailed(&compute(), "", false);
        assert_eq!(mapped.state, ReadinessState::Pending);
        assert!(!mapped.recognized);
    }

    #[test]
    fn configured_tables_apply_only_to_their_type() {
        let config = OrchestratorConfig::from_yaml(
            r#"
status_tables:
  compute:
    STAGING: starting
    gone: absent
"#,
        )
        .unwrap();
        let mapper = config.status_mapper();
        let dns = TypeName::new("dns").unwrap();

        assert_eq!(mapper.map(&compute(), "staging", false), ReadinessState::Starting);
        assert_eq!(mapper.map(&compute(), "gone", true), ReadinessState::Absent);
        assert_eq!(mapper.map(&dns, "staging", false), ReadinessState::Pending);
        assert_eq!(mapper.map(&compute(), "running", false), ReadinessState::Started);
    }

    #[test]
    fn unknown_state_in_table_is_rejected() {
        let result = OrchestratorConfig::from_yaml(
            r#"
status_tables:
  compute:
    staging: warming-up
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn operational_view() {
        assert_eq!(ReadinessState::Pending.operational(), OperationalState::Pending);
        assert_eq!(ReadinessState::Stopped.operational(), OperationalState::Pending);
        assert_eq!(ReadinessState::Starting.operational(), OperationalState::InProgress);
        assert_eq!(ReadinessState::Deleted.operational(), OperationalState::Removed);
    }
}

fn any_state() -> impl Strategy<Value = ReadinessState> {
    proptest::sample::select(ReadinessState::ALL.to_vec())
}

proptest! {
    /// PROPERTY: Mapping never fails; unknown text maps to pending.
    #[test]
    fn property_unknown_status_is_pending(raw in "[a-z]{1,12}-unknown") {
        let mapper = ReadinessStateMapper::default();
        let mapped = mapper.map_detailed(&compute(), &raw, false);
        prop_assert_eq!(mapped.state, ReadinessState::Pending);
        prop_assert!(!mapped.recognized);
    }

    /// PROPERTY: The error flag yields error unless the status means absent.
    #[test]
    fn property_error_flag_dominates_except_absent(raw in ".{0,24}") {
        let mapper = ReadinessStateMapper::default();
        let state = mapper.map(&compute(), &raw, true);
        if mapper.map(&compute(), &raw, false) == ReadinessState::Absent {
            prop_assert_eq!(state, ReadinessState::Absent);
        } else {
            prop_assert_eq!(state, ReadinessState::Error);
        }
    }

    /// PROPERTY: Every canonical name maps to itself, whatever its casing.
    #[test]
    fn property_canonical_names_are_fixed_points(state in any_state(), upper in any::<bool>()) {
        let mapper = ReadinessStateMapper::default();
        let raw = if upper {
            state.as_str().to_ascii_uppercase()
        } else {
            state.as_str().to_string()
        };
        prop_assert_eq!(mapper.map(&compute(), &raw, false), state);
    }
}
