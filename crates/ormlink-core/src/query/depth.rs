//! Include-depth guard.

use super::descriptor::IncludeSpec;

/// Depth of the deepest include chain: 0 with no includes, 1 for one level.
///
/// Bounds how far an input instance is flattened to plain data before it is
/// inspected for nested association values.
pub fn include_depth(includes: &[IncludeSpec]) -> usize {
    includes
        .iter()
        .map(|spec| 1 + include_depth(spec.children()))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{IncludeOverride, QueryDescriptor};

    #[test]
    fn test_depth() {
        assert_eq!(include_depth(&[]), 0);

        let leaf = IncludeSpec::new("Comment", "comments");
        assert_eq!(include_depth(std::slice::from_ref(&leaf)), 1);

        let posts = IncludeSpec::new("Post", "posts").with_nested(Some(
            QueryDescriptor::new("Post").with_include(leaf, IncludeOverride::default()),
        ));
        let mentor = IncludeSpec::new("User", "mentor");
        assert_eq!(include_depth(&[mentor, posts]), 2);
    }
}
