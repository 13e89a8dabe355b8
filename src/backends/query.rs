//! Query builder
//!
//! Turns a logical key path into a yq expression that yields the value and its
//! source line. The builder never looks at the condition.

/// Node every key path is resolved against: the first container of a pod template
pub const CONTAINER_TEMPLATE: &str = ".spec.template.spec.containers[0]";

/// Key path the image-tag condition resolves to
pub const IMAGE_KEY_PATH: &[&str] = &["image"];

/// Build the expression for `key_path`: `<path>, <path> | line`
pub fn build_query<S: AsRef<str>>(key_path: &[S]) -> String {
    let mut selector = String::from(CONTAINER_TEMPLATE);
    for segment in key_path {
        selector.push('.');
        selector.push_str(segment.as_ref());
    }

    [selector.clone(), format!("{} | line", selector)].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_image() {
        assert_eq!(
            build_query(IMAGE_KEY_PATH),
            ".spec.template.spec.containers[0].image, .spec.template.spec.containers[0].image | line"
        );
    }

    #[test]
    fn test_build_query_is_stable() {
        let key = vec!["image".to_string()];
        assert_eq!(build_query(&key), build_query(&key));
        assert_eq!(build_query(&key), build_query(IMAGE_KEY_PATH));
    }

    #[test]
    fn test_build_query_nested_path() {
        assert_eq!(
            build_query(&["resources", "limits"]),
            ".spec.template.spec.containers[0].resources.limits, \
             .spec.template.spec.containers[0].resources.limits | line"
        );
    }

    #[test]
    fn test_build_query_has_no_trailing_separator() {
        let query = build_query(IMAGE_KEY_PATH);
        assert!(!query.trim_end().ends_with(','));
    }

    #[test]
    fn test_build_query_empty_path_selects_container() {
        let empty: &[&str] = &[];
        assert_eq!(
            build_query(empty),
            ".spec.template.spec.containers[0], .spec.template.spec.containers[0] | line"
        );
    }
}
