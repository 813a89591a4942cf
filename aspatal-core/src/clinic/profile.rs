//! Satellite profile records. A profile shares the id of its account and its
//! shape follows the account role.

use crate::auth::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub name: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub name: String,
    pub phone_number: Option<String>,
    /// National Medical Commission registration number
    pub nmc_number: Option<String>,
    pub speciality: Option<String>,
    pub opd_fee: f64,
}

/// Receptionists and administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub name: String,
    pub phone_number: Option<String>,
}

/// Doctor-only fields carried by employee requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorDetails {
    #[serde(default)]
    pub nmc_number: Option<String>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub opd_fee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Profile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
    Staff(StaffProfile),
}

impl Profile {
    /// Build the profile shape matching `role`. Doctor details are dropped for
    /// every other role.
    pub fn for_role(
        role: Role,
        name: impl Into<String>,
        phone_number: Option<String>,
        doctor: DoctorDetails,
    ) -> Self {
        let name = name.into();
        match role {
            Role::Patient => Profile::Patient(PatientProfile { name, phone_number }),
            Role::Doctor => Profile::Doctor(DoctorProfile {
                name,
                phone_number,
                nmc_number: doctor.nmc_number,
                speciality: doctor.speciality,
                opd_fee: doctor.opd_fee,
            }),
            Role::Receptionist | Role::Admin => Profile::Staff(StaffProfile { name, phone_number }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Profile::Patient(p) => &p.name,
            Profile::Doctor(d) => &d.name,
            Profile::Staff(s) => &s.name,
        }
    }

    pub fn phone_number(&self) -> Option<&str> {
        match self {
            Profile::Patient(p) => p.phone_number.as_deref(),
            Profile::Doctor(d) => d.phone_number.as_deref(),
            Profile::Staff(s) => s.phone_number.as_deref(),
        }
    }

    pub fn as_doctor(&self) -> Option<&DoctorProfile> {
        match self {
            Profile::Doctor(d) => Some(d),
            _ => None,
        }
    }
}
