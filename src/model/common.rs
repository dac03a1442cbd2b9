use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// Name of the implicit primary key column every entity carries
pub const PK_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    String,
    Number,
    Boolean,
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Python-style `str.title()` used to derive headings from verbose names:
/// every run of letters starts upper case, everything else is kept as is
pub fn title_case(value: &str) -> String {
    value
        .chars()
        .chunk_by(|c| c.is_alphabetic())
        .into_iter()
        .map(|(alphabetic, run)| {
            if !alphabetic {
                return run.collect::<String>();
            }
            let mut run = run;
            match run.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(run.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect()
}
