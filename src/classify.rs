use std::collections::HashSet;

use crate::config::ClassificationConfig;
use crate::types::ProductKind;

/// Maps loan-type labels to product kinds by exact membership.
#[derive(Debug, Clone)]
pub struct Classifier {
    secured: HashSet<String>,
    unsecured: HashSet<String>,
}

impl Classifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        Self {
            secured: config.secured.iter().cloned().collect(),
            unsecured: config.unsecured.iter().cloned().collect(),
        }
    }

    pub fn classify(&self, loan_type: &str) -> ProductKind {
        if self.secured.contains(loan_type) {
            ProductKind::Secured
        } else if self.unsecured.contains(loan_type) {
            ProductKind::Unsecured
        } else {
            ProductKind::Undetermined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> Classifier {
        Classifier::new(&ClassificationConfig::default())
    }

    #[test]
    fn known_labels() {
        let c = classifier();
        assert_eq!(c.classify("ипотека"), ProductKind::Secured);
        assert_eq!(c.classify("cashloan"), ProductKind::Secured);
        assert_eq!(c.classify("микрозаймы физическим лицам"), ProductKind::Unsecured);
        assert_eq!(c.classify("Овердрафт"), ProductKind::Unsecured);
    }

    #[test]
    fn matching_is_exact() {
        let c = classifier();
        assert_eq!(c.classify("Ипотека"), ProductKind::Undetermined);
        assert_eq!(c.classify(" ипотека"), ProductKind::Undetermined);
        assert_eq!(c.classify(""), ProductKind::Undetermined);
    }

    proptest! {
        #[test]
        fn classify_is_total_and_deterministic(label in ".*") {
            let c = classifier();
            let first = c.classify(&label);
            prop_assert_eq!(first, c.classify(&label));
            prop_assert!(ProductKind::ALL.contains(&first));
        }
    }
}
