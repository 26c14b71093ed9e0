use std::collections::HashSet;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::voter::{NewVoter, Voter, VoterCore},
};

/// A voter as submitted by an admin, individually or in a bulk import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterSpec {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Login code; generated if omitted.
    #[serde(default)]
    pub code: Option<String>,
}

/// A voter as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: ApiId,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub has_voted: bool,
    pub voted_at: Option<DateTime<Utc>>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            code: voter.voter.code,
            name: voter.voter.name,
            email: voter.voter.email,
            has_voted: voter.voter.has_voted,
            voted_at: voter.voter.voted_at,
        }
    }
}

/// Outcome of a bulk import.
#[derive(Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
}

/// A rejected import row. Row numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportRejection {
    pub row: usize,
    pub reason: String,
}

impl ImportRejection {
    fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}

impl Display for ImportRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}

/// Validate a batch of voter specs against the codes already on the roll.
///
/// All-or-nothing: any bad row rejects the whole batch. Generated codes avoid
/// both existing codes and codes appearing earlier in the batch.
pub fn validate_import(
    specs: Vec<VoterSpec>,
    existing_codes: HashSet<String>,
) -> Result<Vec<NewVoter>, Vec<ImportRejection>> {
    let mut taken = existing_codes;
    let mut voters = Vec::with_capacity(specs.len());
    let mut rejections = Vec::new();
    let mut rng = rand::thread_rng();

    for (index, spec) in specs.into_iter().enumerate() {
        let row = index + 1;

        let name = spec.name.trim().to_string();
        if name.is_empty() {
            rejections.push(ImportRejection::new(row, "missing name"));
            continue;
        }

        let given = spec
            .code
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty());
        let code = match given {
            Some(code) => {
                if taken.contains(&code) {
                    rejections.push(ImportRejection::new(
                        row,
                        format!("duplicate code '{code}'"),
                    ));
                    continue;
                }
                code
            }
            None => generate_voter_code(&mut rng, &taken),
        };
        taken.insert(code.clone());

        let email = spec
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());

        voters.push(VoterCore::new(code, name, email));
    }

    if rejections.is_empty() {
        Ok(voters)
    } else {
        Err(rejections)
    }
}

/// Generate an unused voter login code.
///
/// 4-digit codes are easy to hand out on paper slips; if that space is nearly
/// full we move to 5 digits rather than loop forever.
pub fn generate_voter_code<R: Rng>(rng: &mut R, taken: &HashSet<String>) -> String {
    for _ in 0..64 {
        let code = format!("V{}", rng.gen_range(1000..10_000));
        if !taken.contains(&code) {
            return code;
        }
    }
    loop {
        let code = format!("V{}", rng.gen_range(10_000..100_000));
        if !taken.contains(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, code: Option<&str>) -> VoterSpec {
        VoterSpec {
            name: name.to_string(),
            email: None,
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn valid_batch_is_accepted() {
        let specs = vec![
            spec("Amara Okafor", Some("V1001")),
            spec("Ben Whitfield", None),
            spec("  Chloe Ng  ", Some(" V1003 ")),
        ];

        let voters = validate_import(specs, HashSet::new()).unwrap();
        assert_eq!(3, voters.len());
        assert_eq!("V1001", voters[0].code);
        assert_eq!("Chloe Ng", voters[2].name);
        assert_eq!("V1003", voters[2].code);
        assert!(voters.iter().all(|v| !v.has_voted && v.voted_at.is_none()));
    }

    #[test]
    fn missing_name_rejects_the_row() {
        let specs = vec![spec("Amara Okafor", None), spec("   ", Some("V2000"))];

        let rejections = validate_import(specs, HashSet::new()).unwrap_err();
        assert_eq!(vec![ImportRejection::new(2, "missing name")], rejections);
    }

    #[test]
    fn duplicate_code_within_batch_is_rejected() {
        let specs = vec![
            spec("Amara Okafor", Some("V1001")),
            spec("Ben Whitfield", Some("V1001")),
        ];

        let rejections = validate_import(specs, HashSet::new()).unwrap_err();
        assert_eq!(1, rejections.len());
        assert_eq!(2, rejections[0].row);
        assert!(rejections[0].reason.contains("V1001"));
    }

    #[test]
    fn code_clashing_with_existing_roll_is_rejected() {
        let existing = HashSet::from(["V1001".to_string()]);
        let specs = vec![spec("Amara Okafor", Some("V1001"))];

        let rejections = validate_import(specs, existing).unwrap_err();
        assert_eq!(1, rejections[0].row);
    }

    #[test]
    fn any_bad_row_rejects_the_whole_batch() {
        let specs = vec![
            spec("Amara Okafor", Some("V1001")),
            spec("", None),
            spec("Chloe Ng", Some("V1001")),
        ];

        let rejections = validate_import(specs, HashSet::new()).unwrap_err();
        assert_eq!(2, rejections.len());
        assert_eq!(2, rejections[0].row);
        assert_eq!(3, rejections[1].row);
    }

    #[test]
    fn generated_codes_are_unique_within_the_batch() {
        let specs = (0..50).map(|_| spec("Generated Voter", None)).collect();

        let voters = validate_import(specs, HashSet::new()).unwrap();
        let codes: HashSet<_> = voters.iter().map(|v| v.code.clone()).collect();
        assert_eq!(50, codes.len());
        assert!(codes.iter().all(|code| code.starts_with('V')));
    }

    #[test]
    fn generation_widens_when_the_short_space_is_full() {
        let taken: HashSet<String> = (1000..10_000).map(|n| format!("V{n}")).collect();

        let code = generate_voter_code(&mut rand::thread_rng(), &taken);
        assert!(!taken.contains(&code));
        assert_eq!(6, code.len());
    }
}
