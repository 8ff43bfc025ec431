//! Image reference parsing and normalization.
//!
//! References follow the usual registry grammar:
//! `[domain[:port]/]path[:tag][@algorithm:hex]`. Short names are expanded
//! against the default registry, so `myapp` becomes
//! `docker.io/library/myapp:latest`.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

pub const DEFAULT_DOMAIN: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";

const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPO_NAME: &str = "library";
const LOCALHOST: &str = "localhost";
const NAME_TOTAL_LENGTH_MAX: usize = 255;

const PATH_COMPONENT: &str = r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*";
const TAG: &str = r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
const DIGEST: &str = r"[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9A-Fa-f]{32,}";
const DOMAIN_COMPONENT: &str = r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";

static REMAINDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?P<path>{PATH_COMPONENT}(?:/{PATH_COMPONENT})*)(?::(?P<tag>{TAG}))?(?:@(?P<digest>{DIGEST}))?$"
    ))
    .expect("reference grammar is valid")
});

static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:{DOMAIN_COMPONENT}(?:\.{DOMAIN_COMPONENT})*|\[[a-fA-F0-9:]+\])(?::[0-9]+)?$"
    ))
    .expect("domain grammar is valid")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("identifier grammar is valid"));

/// A fully qualified image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    domain: String,
    path: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl Reference {
    /// Parse a possibly-short reference, expanding the registry domain and
    /// official-image namespace. No default tag is added.
    pub fn parse_normalized(value: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidReference {
            value: value.to_string(),
            reason,
        };

        if IDENTIFIER.is_match(value) {
            return Err(invalid("64-byte hexadecimal strings are reserved for image ids"));
        }

        let (domain, remainder) = split_domain(value);
        let name = remainder.split([':', '@']).next().unwrap_or_default();
        if name.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("repository name must be lowercase"));
        }

        if !DOMAIN.is_match(&domain) {
            return Err(invalid("invalid registry domain"));
        }
        let Some(captures) = REMAINDER.captures(&remainder) else {
            return Err(invalid("invalid repository name or tag"));
        };

        let path = captures["path"].to_string();
        if domain.len() + 1 + path.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(invalid("repository name must not be more than 255 characters"));
        }

        Ok(Self {
            domain,
            path,
            tag: captures.name("tag").map(|m| m.as_str().to_string()),
            digest: captures.name("digest").map(|m| m.as_str().to_string()),
        })
    }

    /// Parse and normalize, adding [`DEFAULT_TAG`] when neither a tag nor a
    /// digest is present.
    pub fn parse_tagged(value: &str) -> Result<Self> {
        let mut reference = Self::parse_normalized(value)?;
        if reference.tag.is_none() && reference.digest.is_none() {
            reference.tag = Some(DEFAULT_TAG.to_string());
        }
        Ok(reference)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// `domain/path` without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain, self.path)
    }

    /// The short form users type, e.g. `myapp:latest` for
    /// `docker.io/library/myapp:latest`.
    pub fn familiar(&self) -> String {
        let mut out = if self.domain == DEFAULT_DOMAIN {
            match self.path.split_once('/') {
                Some((OFFICIAL_REPO_NAME, rest)) if !rest.contains('/') => rest.to_string(),
                _ => self.path.clone(),
            }
        } else {
            self.name()
        };
        self.push_suffix(&mut out);
        out
    }

    fn push_suffix(&self, out: &mut String) {
        if let Some(tag) = &self.tag {
            out.push(':');
            out.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            out.push('@');
            out.push_str(digest);
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = self.name();
        self.push_suffix(&mut out);
        f.write_str(&out)
    }
}

fn split_domain(value: &str) -> (String, String) {
    let (mut domain, mut remainder) = match value.split_once('/') {
        Some((first, rest))
            if first.contains(['.', ':'])
                || first == LOCALHOST
                || first.chars().any(|c| c.is_ascii_uppercase()) =>
        {
            (first.to_string(), rest.to_string())
        }
        _ => (DEFAULT_DOMAIN.to_string(), value.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }
    if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
        remainder = format!("{OFFICIAL_REPO_NAME}/{remainder}");
    }
    (domain, remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_gets_defaults() {
        let reference = Reference::parse_tagged("myapp").unwrap();
        assert_eq!(reference.to_string(), "docker.io/library/myapp:latest");
        assert_eq!(reference.familiar(), "myapp:latest");
    }

    #[test]
    fn explicit_tag_is_kept() {
        let reference = Reference::parse_tagged("myorg/myapp:1.2.3").unwrap();
        assert_eq!(reference.to_string(), "docker.io/myorg/myapp:1.2.3");
        assert_eq!(reference.familiar(), "myorg/myapp:1.2.3");
    }

    #[test]
    fn registry_with_port() {
        let reference = Reference::parse_tagged("localhost:5000/team/app").unwrap();
        assert_eq!(reference.domain(), "localhost:5000");
        assert_eq!(reference.path(), "team/app");
        assert_eq!(reference.tag(), Some("latest"));
        assert_eq!(reference.familiar(), "localhost:5000/team/app:latest");
    }

    #[test]
    fn localhost_without_port_is_a_domain() {
        let reference = Reference::parse_tagged("localhost/app").unwrap();
        assert_eq!(reference.to_string(), "localhost/app:latest");
    }

    #[test]
    fn legacy_index_domain_is_rewritten() {
        let reference = Reference::parse_tagged("index.docker.io/redis").unwrap();
        assert_eq!(reference.to_string(), "docker.io/library/redis:latest");
    }

    #[test]
    fn digest_only_gets_no_default_tag() {
        let digest = format!("sha256:{}", "a".repeat(64));
        let reference = Reference::parse_tagged(&format!("busybox@{digest}")).unwrap();
        assert_eq!(reference.tag(), None);
        assert_eq!(reference.digest(), Some(digest.as_str()));
    }

    #[test]
    fn uppercase_repository_is_rejected() {
        let err = Reference::parse_tagged("MyApp").unwrap_err();
        assert!(err.to_string().contains("must be lowercase"));
    }

    #[test]
    fn malformed_references_are_rejected() {
        let image_id = "f".repeat(64);
        for value in ["", "app:", "app:-bad", "a//b", "app@sha256:short", image_id.as_str()] {
            assert!(
                matches!(Reference::parse_tagged(value), Err(Error::InvalidReference { .. })),
                "{value:?} should be rejected"
            );
        }
    }
}
