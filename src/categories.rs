//! Reservation categories and the cutoff columns recorded for each of them.

use crate::error::RankError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    #[serde(rename = "BOYS")]
    Boys,
    #[serde(rename = "GIRLS")]
    Girls,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Boys => "BOYS",
            Gender::Girls => "GIRLS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Oc,
    BcA,
    BcB,
    BcC,
    BcD,
    BcE,
    Sc,
    St,
    Ews,
}

impl Category {
    /// Walk order used when no category filter is given.
    pub const ALL: [Category; 9] = [
        Category::Oc,
        Category::BcA,
        Category::BcB,
        Category::BcC,
        Category::BcD,
        Category::BcE,
        Category::Sc,
        Category::St,
        Category::Ews,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Oc => "OC",
            Category::BcA => "BC-A",
            Category::BcB => "BC-B",
            Category::BcC => "BC-C",
            Category::BcD => "BC-D",
            Category::BcE => "BC-E",
            Category::Sc => "SC",
            Category::St => "ST",
            Category::Ews => "EWS",
        }
    }

    /// The boys key first, then the girls key.
    pub fn keys(&self) -> [CutoffKey; 2] {
        match self {
            Category::Oc => [CutoffKey::OcBoys, CutoffKey::OcGirls],
            Category::BcA => [CutoffKey::BcABoys, CutoffKey::BcAGirls],
            Category::BcB => [CutoffKey::BcBBoys, CutoffKey::BcBGirls],
            Category::BcC => [CutoffKey::BcCBoys, CutoffKey::BcCGirls],
            Category::BcD => [CutoffKey::BcDBoys, CutoffKey::BcDGirls],
            Category::BcE => [CutoffKey::BcEBoys, CutoffKey::BcEGirls],
            Category::Sc => [CutoffKey::ScBoys, CutoffKey::ScGirls],
            Category::St => [CutoffKey::StBoys, CutoffKey::StGirls],
            Category::Ews => [CutoffKey::EwsGenOu, CutoffKey::EwsGirlsOu],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl FromStr for Category {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace('_', "-");
        Category::ALL
            .into_iter()
            .find(|category| category.name() == wanted)
            .ok_or_else(|| {
                let valid: Vec<&str> = Category::ALL.iter().map(|c| c.name()).collect();
                RankError::InvalidInput(format!(
                    "Unknown category '{}'. Expected one of: {}",
                    s.trim(),
                    valid.join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CutoffKey {
    OcBoys,
    OcGirls,
    BcABoys,
    BcAGirls,
    BcBBoys,
    BcBGirls,
    BcCBoys,
    BcCGirls,
    BcDBoys,
    BcDGirls,
    BcEBoys,
    BcEGirls,
    ScBoys,
    ScGirls,
    StBoys,
    StGirls,
    EwsGenOu,
    EwsGirlsOu,
}

struct KeyDef {
    key: CutoffKey,
    name: &'static str,
    column: &'static str,
    category: Category,
    gender: Gender,
}

const fn def(
    key: CutoffKey,
    name: &'static str,
    column: &'static str,
    category: Category,
    gender: Gender,
) -> KeyDef {
    KeyDef {
        key,
        name,
        column,
        category,
        gender,
    }
}

// Indexed by `CutoffKey as usize`.
static KEY_TABLE: [KeyDef; 18] = [
    def(CutoffKey::OcBoys, "OC_BOYS", "OC BOYS", Category::Oc, Gender::Boys),
    def(CutoffKey::OcGirls, "OC_GIRLS", "OC GIRLS", Category::Oc, Gender::Girls),
    def(CutoffKey::BcABoys, "BC_A_BOYS", "BC_A BOYS", Category::BcA, Gender::Boys),
    def(CutoffKey::BcAGirls, "BC_A_GIRLS", "BC_A GIRLS", Category::BcA, Gender::Girls),
    def(CutoffKey::BcBBoys, "BC_B_BOYS", "BC_B BOYS", Category::BcB, Gender::Boys),
    def(CutoffKey::BcBGirls, "BC_B_GIRLS", "BC_B GIRLS", Category::BcB, Gender::Girls),
    def(CutoffKey::BcCBoys, "BC_C_BOYS", "BC_C BOYS", Category::BcC, Gender::Boys),
    def(CutoffKey::BcCGirls, "BC_C_GIRLS", "BC_C GIRLS", Category::BcC, Gender::Girls),
    def(CutoffKey::BcDBoys, "BC_D_BOYS", "BC_D BOYS", Category::BcD, Gender::Boys),
    def(CutoffKey::BcDGirls, "BC_D_GIRLS", "BC_D GIRLS", Category::BcD, Gender::Girls),
    def(CutoffKey::BcEBoys, "BC_E_BOYS", "BC_E BOYS", Category::BcE, Gender::Boys),
    def(CutoffKey::BcEGirls, "BC_E_GIRLS", "BC_E GIRLS", Category::BcE, Gender::Girls),
    def(CutoffKey::ScBoys, "SC_BOYS", "SC BOYS", Category::Sc, Gender::Boys),
    def(CutoffKey::ScGirls, "SC_GIRLS", "SC GIRLS", Category::Sc, Gender::Girls),
    def(CutoffKey::StBoys, "ST_BOYS", "ST BOYS", Category::St, Gender::Boys),
    def(CutoffKey::StGirls, "ST_GIRLS", "ST GIRLS", Category::St, Gender::Girls),
    def(CutoffKey::EwsGenOu, "EWS_GEN_OU", "EWS GEN OU", Category::Ews, Gender::Boys),
    def(CutoffKey::EwsGirlsOu, "EWS_GIRLS_OU", "EWS GIRLS OU", Category::Ews, Gender::Girls),
];

impl CutoffKey {
    pub const ALL: [CutoffKey; 18] = [
        CutoffKey::OcBoys,
        CutoffKey::OcGirls,
        CutoffKey::BcABoys,
        CutoffKey::BcAGirls,
        CutoffKey::BcBBoys,
        CutoffKey::BcBGirls,
        CutoffKey::BcCBoys,
        CutoffKey::BcCGirls,
        CutoffKey::BcDBoys,
        CutoffKey::BcDGirls,
        CutoffKey::BcEBoys,
        CutoffKey::BcEGirls,
        CutoffKey::ScBoys,
        CutoffKey::ScGirls,
        CutoffKey::StBoys,
        CutoffKey::StGirls,
        CutoffKey::EwsGenOu,
        CutoffKey::EwsGirlsOu,
    ];

    fn def(&self) -> &'static KeyDef {
        &KEY_TABLE[*self as usize]
    }

    /// Key as stored in the cutoff map, e.g. `BC_A_GIRLS`.
    pub fn as_str(&self) -> &'static str {
        self.def().name
    }

    /// Header used for this key in import spreadsheets, e.g. `BC_A GIRLS`.
    pub fn column_label(&self) -> &'static str {
        self.def().column
    }

    pub fn category(&self) -> Category {
        self.def().category
    }

    pub fn gender(&self) -> Gender {
        self.def().gender
    }

    pub fn from_name(name: &str) -> Option<CutoffKey> {
        KEY_TABLE.iter().find(|d| d.name == name).map(|d| d.key)
    }
}

impl fmt::Display for CutoffKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
