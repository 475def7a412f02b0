//! Action-name normalization and result-key composition.

/// Suffix dropped from write actions (`createOne` → `create`).
const ONE_SUFFIX: &str = "One";

/// Suffix on actions that raise when nothing matches; always kept last in a result key.
const OR_THROW_SUFFIX: &str = "OrThrow";

/// Normalizes an incoming action name by removing a trailing `One`.
///
/// ```
/// use dataproxy::query::normalize_action;
///
/// assert_eq!(normalize_action("createOne"), "create");
/// assert_eq!(normalize_action("findMany"), "findMany");
/// ```
pub fn normalize_action(action: &str) -> &str {
    action.strip_suffix(ONE_SUFFIX).unwrap_or(action)
}

/// Joins an action and a model name into the key used in response payloads.
///
/// An `OrThrow` suffix on the action is moved behind the model name.
///
/// ```
/// use dataproxy::query::join_action;
///
/// assert_eq!(join_action("findUnique", "User"), "findUniqueUser");
/// assert_eq!(join_action("findUniqueOrThrow", "User"), "findUniqueUserOrThrow");
/// ```
pub fn join_action(action: &str, model_name: &str) -> String {
    match action.strip_suffix(OR_THROW_SUFFIX) {
        Some(base) => format!("{base}{model_name}{OR_THROW_SUFFIX}"),
        None => format!("{action}{model_name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_one_suffix() {
        assert_eq!(normalize_action("updateOne"), "update");
        assert_eq!(normalize_action("deleteOne"), "delete");
        assert_eq!(normalize_action("upsertOne"), "upsert");
    }

    #[test]
    fn leaves_other_actions() {
        assert_eq!(normalize_action("findFirst"), "findFirst");
        assert_eq!(normalize_action("aggregate"), "aggregate");
    }

    #[test]
    fn join_plain_actions() {
        assert_eq!(join_action("findMany", "User"), "findManyUser");
        assert_eq!(join_action("findFirst", "Post"), "findFirstPost");
    }

    #[test]
    fn join_relocates_or_throw() {
        assert_eq!(join_action("findFirstOrThrow", "User"), "findFirstUserOrThrow");
        assert_eq!(join_action("findUniqueOrThrow", "Session"), "findUniqueSessionOrThrow");
    }

    #[test]
    fn join_without_model() {
        assert_eq!(join_action("executeRaw", ""), "executeRaw");
    }
}
