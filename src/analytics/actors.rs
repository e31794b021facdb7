//! Applicant name normalization.
//!
//! The normalized form is the merge key that lets patent applicants and
//! project organizations land on the same actor: uppercased, punctuation
//! removed, and a trailing corporate suffix stripped (longest match wins).

use once_cell::sync::Lazy;

/// Corporate suffixes, longest first so "CO LTD" wins over "LTD".
static CORPORATE_SUFFIXES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut suffixes = vec![
        " CO LTD", " LTD", " INC", " CORP", " CORPORATION", " GMBH", " AG", " SA", " SAS",
        " SE", " NV", " BV", " KK", " AB", " OY", " AS", " PLC", " LLC", " PTY", " & CO KG",
        " KG",
    ];
    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
    suffixes
});

/// Normalize a raw applicant name.
pub fn normalize_applicant_name(name: &str) -> String {
    let mut name = name.trim().to_uppercase().replace(['.', ','], "");
    for suffix in CORPORATE_SUFFIXES.iter() {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped.trim_end().to_string();
            break;
        }
    }
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize_applicant_name;

    #[test]
    fn strips_longest_suffix_first() {
        assert_eq!(normalize_applicant_name("Quantum Devices Co. Ltd."), "QUANTUM DEVICES");
        assert_eq!(normalize_applicant_name("Siemens AG"), "SIEMENS");
        assert_eq!(normalize_applicant_name("Maschinenbau & Co. KG"), "MASCHINENBAU");
    }

    #[test]
    fn removes_punctuation_and_collapses_spaces() {
        assert_eq!(normalize_applicant_name("  Acme,  Inc. "), "ACME");
        assert_eq!(normalize_applicant_name("A.B.C GmbH"), "ABC");
    }

    #[test]
    fn only_one_suffix_is_stripped() {
        // The break after the first match keeps compound names intact
        assert_eq!(normalize_applicant_name("Nordic Energy AB LTD"), "NORDIC ENERGY AB");
    }

    #[test]
    fn plain_names_pass_through_uppercased() {
        assert_eq!(normalize_applicant_name("Fraunhofer Gesellschaft"), "FRAUNHOFER GESELLSCHAFT");
    }
}
