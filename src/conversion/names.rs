use std::collections::HashSet;

/// Returns a short random identifier, e.g. "3FA2C1".
pub fn short_id() -> String {
    let uid = uuid::Uuid::new_v4().to_simple().to_string();
    uid[..6].to_uppercase()
}

/// Hands out names that are unique among every name claimed so far.
#[derive(Debug, Default, Clone)]
pub struct UniqueNames {
    taken: HashSet<String>,
}

impl UniqueNames {
    pub fn new() -> Self {
        Default::default()
    }

    /// Claims `name` as is if it is free, or with a random suffix otherwise.
    pub fn claim(&mut self, name: &str) -> String {
        if self.taken.insert(name.to_string()) {
            name.to_string()
        } else {
            self.claim_suffixed(name)
        }
    }

    /// Claims `name` followed by a random suffix, even if `name` itself is free.
    pub fn claim_suffixed(&mut self, name: &str) -> String {
        loop {
            let candidate = format!("{}_{}", name, short_id());
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

impl<S: Into<String>> FromIterator<S> for UniqueNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            taken: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn claims() {
        let mut names = UniqueNames::from_iter(["world"]);

        assert_eq!("cube", names.claim("cube"));

        let renamed = names.claim("cube");
        assert!(renamed.starts_with("cube_"));
        assert_eq!("cube_".len() + 6, renamed.len());

        assert_ne!("world", names.claim("world"));
        assert!(names.claim_suffixed("sphere").starts_with("sphere_"));
        assert_eq!("sphere", names.claim("sphere"));
    }
}
