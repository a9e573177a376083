use std::collections::HashSet;

use herald_types::models::UserId;

/// Static, process-wide set of operator identities.
///
/// There is no caching of a positive check: every privileged action asks
/// again.
#[derive(Debug, Clone, Default)]
pub struct OperatorAllowList {
    ids: HashSet<UserId>,
}

impl OperatorAllowList {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn is_operator(&self, id: UserId) -> bool {
        self.ids.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_ids_are_operators() {
        let operators = OperatorAllowList::new([123456789, 987654321]);
        assert!(operators.is_operator(123456789));
        assert!(!operators.is_operator(1));
        assert!(operators.is_operator(987654321));
    }
}
