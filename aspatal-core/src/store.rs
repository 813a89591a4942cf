//! Credential store and clinic repositories.
//!
//! The traits are the data-access seam; [`MemoryStore`] keeps every table behind
//! a single `RwLock` so each multi-record write (account + profile insert,
//! profile-then-account delete, booking approval) happens in one critical
//! section and uniqueness checks cannot race with the write that follows them.

use crate::auth::{activate, Account, AccountId, NewAccount, PendingVerification, Role};
use crate::clinic::{
    Appointment, AppointmentStatus, BookingRequest, BookingStatus, ChatMessage, NewBooking,
    NewPrescription, Prescription, Profile, RecordId,
};
use crate::error::ErrorCategory;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email '{0}' is already registered")]
    DuplicateEmail(String),

    #[error("verification token collision")]
    DuplicateToken,

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::DuplicateEmail(_) => "duplicate_email",
            StoreError::DuplicateToken => "duplicate_token",
            StoreError::Conflict(_) => "conflict",
            StoreError::NotFound(_) => "not_found",
            StoreError::Backend(_) => "store_unavailable",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            StoreError::DuplicateEmail(_) | StoreError::DuplicateToken | StoreError::Conflict(_) => {
                ErrorCategory::Conflict
            }
            StoreError::NotFound(_) => ErrorCategory::NotFound,
            StoreError::Backend(_) => ErrorCategory::Internal,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keyed account repository. Emails passed in are already normalised.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>>;

    /// Insert an account and, optionally, its profile as one write. Fails with
    /// `DuplicateEmail` / `DuplicateToken` when a uniqueness constraint is hit.
    async fn insert(&self, account: NewAccount, profile: Option<Profile>) -> StoreResult<Account>;

    /// Change an account's email and role and replace its profile in one write.
    /// Credentials, verification state and login time are left as stored.
    async fn update_details(
        &self,
        id: AccountId,
        email: &str,
        role: Role,
        profile: Profile,
    ) -> StoreResult<Account>;

    /// Check and clear a verification token, activating its account. `None`
    /// when the token is unknown, already consumed or expired.
    async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>>;

    /// Replace the token of a PENDING account. Returns `false` without writing
    /// when the account is already ACTIVE.
    async fn reissue_verification(
        &self,
        id: AccountId,
        pending: PendingVerification,
    ) -> StoreResult<bool>;

    async fn record_login(&self, id: AccountId, at: DateTime<Utc>) -> StoreResult<()>;

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<Account>>;

    /// Lowest-id administrator, the default chat counterparty.
    async fn first_admin(&self) -> StoreResult<Option<Account>>;

    /// Delete the profile, then the account, atomically.
    async fn delete_with_profile(&self, id: AccountId) -> StoreResult<Account>;
}

#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn profile(&self, id: AccountId) -> StoreResult<Option<Profile>>;

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<BookingRequest>;

    async fn bookings_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<BookingRequest>>;

    async fn bookings_with_status(&self, status: BookingStatus) -> StoreResult<Vec<BookingRequest>>;

    /// Approve or reject a pending booking. Approval creates a scheduled
    /// appointment in the same write. Fails with `Conflict` if the booking has
    /// already been decided.
    async fn decide_booking(
        &self,
        id: RecordId,
        approve: bool,
    ) -> StoreResult<(BookingRequest, Option<Appointment>)>;

    async fn appointment(&self, id: RecordId) -> StoreResult<Option<Appointment>>;

    async fn appointments_for_doctor(
        &self,
        doctor_id: AccountId,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Appointment>>;

    async fn appointments_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<Appointment>>;

    async fn set_appointment_status(
        &self,
        id: RecordId,
        status: AppointmentStatus,
    ) -> StoreResult<Appointment>;

    async fn insert_prescription(&self, prescription: NewPrescription) -> StoreResult<Prescription>;

    async fn prescriptions_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<Prescription>>;

    async fn insert_message(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        content: String,
    ) -> StoreResult<ChatMessage>;

    /// Messages exchanged between `a` and `b`, oldest first.
    async fn messages_between(&self, a: AccountId, b: AccountId) -> StoreResult<Vec<ChatMessage>>;

    async fn messages_involving(&self, id: AccountId) -> StoreResult<Vec<ChatMessage>>;
}

/// Everything the clinic services need from persistence.
pub trait Store: AccountStore + ClinicStore {}

impl<T: AccountStore + ClinicStore> Store for T {}

#[derive(Default)]
struct Tables {
    next_account_id: AccountId,
    next_record_id: RecordId,
    accounts: BTreeMap<AccountId, Account>,
    emails: HashMap<String, AccountId>,
    tokens: HashMap<String, AccountId>,
    profiles: HashMap<AccountId, Profile>,
    bookings: BTreeMap<RecordId, BookingRequest>,
    appointments: BTreeMap<RecordId, Appointment>,
    prescriptions: BTreeMap<RecordId, Prescription>,
    messages: Vec<ChatMessage>,
}

impl Tables {
    fn next_record_id(&mut self) -> RecordId {
        self.next_record_id += 1;
        self.next_record_id
    }

    fn account_mut(&mut self, id: AccountId) -> StoreResult<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("account".to_string()))
    }
}

/// In-process store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.tables.read().accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let tables = self.tables.read();
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.tables.read().accounts.get(&id).cloned())
    }

    async fn insert(&self, account: NewAccount, profile: Option<Profile>) -> StoreResult<Account> {
        let mut tables = self.tables.write();

        if tables.emails.contains_key(&account.email) {
            return Err(StoreError::DuplicateEmail(account.email));
        }
        if let Some(v) = &account.verification {
            if tables.tokens.contains_key(&v.token) {
                return Err(StoreError::DuplicateToken);
            }
        }

        tables.next_account_id += 1;
        let id = tables.next_account_id;
        let record = Account {
            id,
            email: account.email,
            password_hash: account.password_hash,
            role: account.role,
            enabled: account.enabled,
            verification: account.verification,
            created_at: Utc::now(),
            last_login: None,
        };

        tables.emails.insert(record.email.clone(), id);
        if let Some(v) = &record.verification {
            tables.tokens.insert(v.token.clone(), id);
        }
        if let Some(profile) = profile {
            tables.profiles.insert(id, profile);
        }
        tables.accounts.insert(id, record.clone());

        Ok(record)
    }

    async fn update_details(
        &self,
        id: AccountId,
        email: &str,
        role: Role,
        profile: Profile,
    ) -> StoreResult<Account> {
        let mut tables = self.tables.write();

        if let Some(owner) = tables.emails.get(email) {
            if *owner != id {
                return Err(StoreError::DuplicateEmail(email.to_string()));
            }
        }

        let account = tables.account_mut(id)?;
        let previous_email = std::mem::replace(&mut account.email, email.to_string());
        account.role = role;
        let updated = account.clone();

        tables.emails.remove(&previous_email);
        tables.emails.insert(updated.email.clone(), id);
        tables.profiles.insert(id, profile);

        Ok(updated)
    }

    async fn consume_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        let mut tables = self.tables.write();

        let Some(id) = tables.tokens.get(token).copied() else {
            return Ok(None);
        };
        let account = tables.account_mut(id)?;
        if activate(account, token, now).is_err() {
            return Ok(None);
        }
        let activated = account.clone();
        tables.tokens.remove(token);

        Ok(Some(activated))
    }

    async fn reissue_verification(
        &self,
        id: AccountId,
        pending: PendingVerification,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();

        if tables.tokens.contains_key(&pending.token) {
            return Err(StoreError::DuplicateToken);
        }
        let account = tables.account_mut(id)?;
        if account.enabled {
            return Ok(false);
        }
        let new_token = pending.token.clone();
        let superseded = account.verification.replace(pending);

        if let Some(old) = superseded {
            tables.tokens.remove(&old.token);
        }
        tables.tokens.insert(new_token, id);

        Ok(true)
    }

    async fn record_login(&self, id: AccountId, at: DateTime<Utc>) -> StoreResult<()> {
        self.tables.write().account_mut(id)?.last_login = Some(at);
        Ok(())
    }

    async fn list_by_role(&self, role: Role) -> StoreResult<Vec<Account>> {
        Ok(self
            .tables
            .read()
            .accounts
            .values()
            .filter(|a| a.role == role)
            .cloned()
            .collect())
    }

    async fn first_admin(&self) -> StoreResult<Option<Account>> {
        Ok(self
            .tables
            .read()
            .accounts
            .values()
            .find(|a| a.role == Role::Admin)
            .cloned())
    }

    async fn delete_with_profile(&self, id: AccountId) -> StoreResult<Account> {
        let mut tables = self.tables.write();

        if !tables.accounts.contains_key(&id) {
            return Err(StoreError::NotFound("account".to_string()));
        }

        tables.profiles.remove(&id);
        let account = tables
            .accounts
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound("account".to_string()))?;
        tables.emails.remove(&account.email);
        if let Some(v) = &account.verification {
            tables.tokens.remove(&v.token);
        }

        Ok(account)
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn profile(&self, id: AccountId) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().profiles.get(&id).cloned())
    }

    async fn insert_booking(&self, booking: NewBooking) -> StoreResult<BookingRequest> {
        let mut tables = self.tables.write();
        let id = tables.next_record_id();
        let record = BookingRequest {
            id,
            patient_id: booking.patient_id,
            doctor_id: booking.doctor_id,
            date: booking.date,
            time: booking.time,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
        };
        tables.bookings.insert(id, record.clone());
        Ok(record)
    }

    async fn bookings_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<BookingRequest>> {
        Ok(self
            .tables
            .read()
            .bookings
            .values()
            .filter(|b| b.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn bookings_with_status(&self, status: BookingStatus) -> StoreResult<Vec<BookingRequest>> {
        Ok(self
            .tables
            .read()
            .bookings
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn decide_booking(
        &self,
        id: RecordId,
        approve: bool,
    ) -> StoreResult<(BookingRequest, Option<Appointment>)> {
        let mut tables = self.tables.write();

        let booking = tables
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("booking request".to_string()))?;
        if booking.status != BookingStatus::Pending {
            return Err(StoreError::Conflict(
                "booking request has already been decided".to_string(),
            ));
        }

        let mut decided = booking;
        let appointment = if approve {
            decided.status = BookingStatus::Approved;
            let appointment_id = tables.next_record_id();
            let appointment = Appointment {
                id: appointment_id,
                patient_id: decided.patient_id,
                doctor_id: decided.doctor_id,
                date: decided.date,
                time: decided.time,
                status: AppointmentStatus::Scheduled,
                booking_id: Some(decided.id),
            };
            tables.appointments.insert(appointment_id, appointment.clone());
            Some(appointment)
        } else {
            decided.status = BookingStatus::Rejected;
            None
        };
        tables.bookings.insert(id, decided.clone());

        Ok((decided, appointment))
    }

    async fn appointment(&self, id: RecordId) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.read().appointments.get(&id).cloned())
    }

    async fn appointments_for_doctor(
        &self,
        doctor_id: AccountId,
        date: Option<NaiveDate>,
    ) -> StoreResult<Vec<Appointment>> {
        let mut list: Vec<Appointment> = self
            .tables
            .read()
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && date.map_or(true, |d| a.date == d))
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(list)
    }

    async fn appointments_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<Appointment>> {
        let mut list: Vec<Appointment> = self
            .tables
            .read()
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(list)
    }

    async fn set_appointment_status(
        &self,
        id: RecordId,
        status: AppointmentStatus,
    ) -> StoreResult<Appointment> {
        let mut tables = self.tables.write();
        let appointment = tables
            .appointments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("appointment".to_string()))?;
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn insert_prescription(&self, prescription: NewPrescription) -> StoreResult<Prescription> {
        let mut tables = self.tables.write();
        let id = tables.next_record_id();
        let record = Prescription {
            id,
            doctor_id: prescription.doctor_id,
            patient_id: prescription.patient_id,
            content: prescription.content,
            created_at: Utc::now(),
        };
        tables.prescriptions.insert(id, record.clone());
        Ok(record)
    }

    async fn prescriptions_for_patient(&self, patient_id: AccountId) -> StoreResult<Vec<Prescription>> {
        Ok(self
            .tables
            .read()
            .prescriptions
            .values()
            .filter(|p| p.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn insert_message(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        content: String,
    ) -> StoreResult<ChatMessage> {
        let mut tables = self.tables.write();
        let id = tables.next_record_id();
        let message = ChatMessage {
            id,
            sender_id,
            receiver_id,
            content,
            sent_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn messages_between(&self, a: AccountId, b: AccountId) -> StoreResult<Vec<ChatMessage>> {
        let mut list: Vec<ChatMessage> = self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b) || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect();
        list.sort_by_key(|m| (m.sent_at, m.id));
        Ok(list)
    }

    async fn messages_involving(&self, id: AccountId) -> StoreResult<Vec<ChatMessage>> {
        Ok(self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| m.sender_id == id || m.receiver_id == id)
            .cloned()
            .collect())
    }
}
