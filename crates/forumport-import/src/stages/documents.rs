//! Topics commenting on a document of the main site.
//!
//! Their titles encode the document: `{id}_{locale}` or
//! `{id}_{locale}_{type}`.

use url::Url;

use forumport::MigrationRules;

/// A document reference decoded from a topic title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: i64,
    pub locale: String,
    pub doc_type: Option<char>,
}

impl DocumentRef {
    pub fn parse(title: &str) -> Option<Self> {
        let mut parts = title.trim().split('_');
        let id = parts.next()?.parse::<i64>().ok()?;
        let locale = parts.next()?;
        if locale.is_empty() || !locale.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let doc_type = match parts.next() {
            None => None,
            Some(t) => {
                let mut chars = t.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return None,
                }
            }
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            id,
            locale: locale.to_ascii_lowercase(),
            doc_type,
        })
    }

    /// URL path segment for the document type.
    pub fn segment<'a>(&self, default: &'a str) -> &'a str {
        match self.doc_type {
            Some('w') => "waypoints",
            Some('r') => "routes",
            Some('o') => "outings",
            Some('i') => "images",
            Some('c') => "articles",
            Some('b') => "books",
            Some('x') => "xreports",
            Some('a') => "areas",
            Some('m') => "maps",
            Some('u') => "profiles",
            _ => default,
        }
    }

    /// `{document_base_url}/{segment}/{id}/{locale}`. `None` if the base URL
    /// cannot take a path.
    pub fn url(&self, rules: &MigrationRules) -> Option<Url> {
        let mut url = Url::parse(&rules.document_base_url).ok()?;
        let id = self.id.to_string();
        url.path_segments_mut().ok()?.pop_if_empty().extend([
            self.segment(&rules.default_document_segment),
            id.as_str(),
            self.locale.as_str(),
        ]);
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            DocumentRef::parse("12345_fr"),
            Some(DocumentRef {
                id: 12345,
                locale: "fr".to_string(),
                doc_type: None,
            })
        );
        assert_eq!(
            DocumentRef::parse("678_de_r").map(|d| d.doc_type),
            Some(Some('r'))
        );
        assert_eq!(DocumentRef::parse("Les Écrins en hiver"), None);
        assert_eq!(DocumentRef::parse("12_"), None);
        assert_eq!(DocumentRef::parse("12_fr_route"), None);
        assert_eq!(DocumentRef::parse("12_fr_r_x"), None);
        assert_eq!(DocumentRef::parse("12"), None);
    }

    #[test]
    fn test_url() {
        let rules = MigrationRules::default();
        let route = DocumentRef::parse("678_de_r").unwrap();
        assert_eq!(
            route.url(&rules).unwrap().as_str(),
            "https://www.camptocamp.org/routes/678/de"
        );

        let untyped = DocumentRef::parse("5_it").unwrap();
        assert_eq!(
            untyped.url(&rules).unwrap().as_str(),
            "https://www.camptocamp.org/documents/5/it"
        );

        let unknown = DocumentRef::parse("5_it_z").unwrap();
        assert_eq!(unknown.segment("documents"), "documents");

        let prefixed = MigrationRules {
            document_base_url: "https://example.org/v6/".to_string(),
            ..MigrationRules::default()
        };
        assert_eq!(
            DocumentRef::parse("9_en_w").unwrap().url(&prefixed).unwrap().as_str(),
            "https://example.org/v6/waypoints/9/en"
        );
    }
}
