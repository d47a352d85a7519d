use std::fmt::{Display, Formatter};

/// Represents a DICOM person name.
/// Contains family, given, middle name, prefix and suffix.
/// The DICOM string representation is split by the `^` separator
/// into its respective components.
/// Component groups (`=`) are kept inside the family component.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct PersonName {
    /// Family name complex
    pub family: String,
    /// Given name complex
    pub given: String,
    /// Middle name
    pub middle: String,
    /// Name prefix
    pub prefix: String,
    /// Name suffix
    pub suffix: String,
}

impl PersonName {
    /// Create a person name from its family and given names.
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        PersonName {
            family: family.into(),
            given: given.into(),
            ..Default::default()
        }
    }

    /// Parse the `family^given^middle^prefix^suffix` form.
    /// Missing trailing components are left empty.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.splitn(5, '^');
        let mut next = || parts.next().unwrap_or_default().to_owned();
        PersonName {
            family: next(),
            given: next(),
            middle: next(),
            prefix: next(),
            suffix: next(),
        }
    }

    /// The five components in encoding order.
    pub fn components(&self) -> [&str; 5] {
        [
            &self.family,
            &self.given,
            &self.middle,
            &self.prefix,
            &self.suffix,
        ]
    }

    /// Render the name in DICOM form,
    /// omitting trailing empty components.
    pub fn to_dicom_string(&self) -> String {
        let mut name = self.components().join("^");
        let trimmed = name.trim_end_matches('^').len();
        name.truncate(trimmed);
        name
    }
}

impl Display for PersonName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts = [
            &self.prefix,
            &self.given,
            &self.middle,
            &self.family,
            &self.suffix,
        ];
        let mut first = true;
        for part in parts.iter().filter(|p| !p.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::PersonName;

    #[test]
    fn dicom_form_drops_trailing_separators() {
        let p = PersonName::new("Doe", "John");
        assert_eq!(p.to_dicom_string(), "Doe^John");
        assert_eq!(PersonName::parse("Doe^John"), p);
    }

    #[test]
    fn all_components() {
        let p = PersonName::parse("Adams^John Robert Quincy^^Rev.^B.A. M.Div.");
        assert_eq!(p.family, "Adams");
        assert_eq!(p.given, "John Robert Quincy");
        assert_eq!(p.middle, "");
        assert_eq!(p.prefix, "Rev.");
        assert_eq!(p.suffix, "B.A. M.Div.");
        assert_eq!(p.to_string(), "Rev. John Robert Quincy Adams B.A. M.Div.");
        assert_eq!(
            p.to_dicom_string(),
            "Adams^John Robert Quincy^^Rev.^B.A. M.Div."
        );
    }
}
