/// Posting-token construction.
///
/// Tokens embed a NUL delimiter so attribute keys can never collide with
/// values: `scope \0 k:key \0 v:value` for equality and
/// `scope \0 k:key \0 *` for presence, with `scope` one of `top` / `attr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Top,
    Attr,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Top => "top",
            Scope::Attr => "attr",
        }
    }
}

pub fn eq_token(scope: Scope, key: &str, value: &str) -> String {
    format!("{}\0k:{}\0v:{}", scope.as_str(), key, value)
}

pub fn presence_token(scope: Scope, key: &str) -> String {
    format!("{}\0k:{}\0*", scope.as_str(), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_delimiter_prevents_key_value_collision() {
        // Without the delimiter these two would be the same token
        let a = eq_token(Scope::Attr, "tag", "x:v:y");
        let b = eq_token(Scope::Attr, "tag\0v:x:v", "y");
        assert_ne!(a, b);
    }

    #[test]
    fn presence_token_is_distinct_from_star_value() {
        assert_ne!(
            presence_token(Scope::Attr, "tag"),
            eq_token(Scope::Attr, "tag", "*")
        );
    }
}
