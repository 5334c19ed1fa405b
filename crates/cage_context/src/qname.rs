use std::fmt;
use std::str::FromStr;

use cage_ast::SEPARATOR;

/// A segmented namespace path such as `Me\Module\ThingA`.
///
/// Empty segments are dropped on construction, so `\Me\\Module\` and
/// `Me\Module` are the same name. All operations return new values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    parts: Vec<String>,
}

impl QName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts
                .into_iter()
                .map(Into::into)
                .filter(|part: &String| !part.is_empty())
                .collect(),
        }
    }

    /// Split on the namespace separator
    pub fn parse(text: &str) -> Self {
        Self::new(text.split(SEPARATOR))
    }

    /// `ns` followed by a single local name
    pub fn from_ns_and_name(ns: &QName, name: &str) -> Self {
        Self::new(ns.parts.iter().map(String::as_str).chain([name]))
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<String> {
        self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Everything but the last segment; empty for names of one segment
    pub fn parent(&self) -> QName {
        match self.parts.split_last() {
            Some((_, rest)) => Self {
                parts: rest.to_vec(),
            },
            None => Self::default(),
        }
    }

    /// The last segment
    pub fn name(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    /// Position of `search` in this name.
    ///
    /// Only the first occurrence of `search[0]` is considered; if the rest
    /// of `search` does not follow it contiguously there is no match.
    pub fn index_of(&self, search: &[String]) -> Option<usize> {
        let first = search.first()?;
        let start = self.parts.iter().position(|part| part == first)?;
        let tail = self.parts.get(start..start + search.len())?;
        (tail == search).then_some(start)
    }

    /// Splice `replace` in place of `search`, optionally only when it sits at `at`
    pub fn replace(&self, search: &[String], replace: &[String], at: Option<usize>) -> QName {
        let Some(index) = self.index_of(search) else {
            return self.clone();
        };
        if at.is_some_and(|at| at != index) {
            return self.clone();
        }

        let mut parts = self.parts[..index].to_vec();
        parts.extend(replace.iter().cloned());
        parts.extend(self.parts[index + search.len()..].iter().cloned());
        Self::new(parts)
    }

    /// `a` followed by `b`
    pub fn merge(a: &QName, b: &QName) -> QName {
        Self::new(a.parts.iter().chain(&b.parts).cloned())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl FromStr for QName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&[String]> for QName {
    fn from(parts: &[String]) -> Self {
        Self::new(parts.iter().cloned())
    }
}
