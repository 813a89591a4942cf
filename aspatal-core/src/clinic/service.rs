use crate::auth::{
    normalize_email, validate_email, validate_name, Account, AccountId, AuditEntry,
    AuditEventType, AuthSystem, CredentialDelivery, Identity, ProvisionRequest, Provisioned, Role,
};
use crate::clinic::{
    latest_per_counterparty, Appointment, AppointmentStatus, BookingRequest, BookingStatus,
    ChatMessage, DoctorDetails, InboxEntry, NewBooking, NewPrescription, Prescription, Profile,
    RecordId, UNKNOWN_PATIENT,
};
use crate::error::{ClinicError, ClinicResult};
use crate::store::Store;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Person as listed in the admin and receptionist directories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberView {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub enabled: bool,
    pub nmc_number: Option<String>,
    pub speciality: Option<String>,
    pub opd_fee: f64,
    pub created_at: DateTime<Utc>,
}

impl MemberView {
    fn new(account: &Account, profile: Option<&Profile>) -> Self {
        let doctor = profile.and_then(Profile::as_doctor);
        Self {
            id: account.id,
            name: profile.map(|p| p.name().to_string()).unwrap_or_default(),
            email: account.email.clone(),
            phone_number: profile.and_then(|p| p.phone_number()).map(str::to_string),
            role: account.role,
            enabled: account.enabled,
            nmc_number: doctor.and_then(|d| d.nmc_number.clone()),
            speciality: doctor.and_then(|d| d.speciality.clone()),
            opd_fee: doctor.map_or(0.0, |d| d.opd_fee),
            created_at: account.created_at,
        }
    }
}

/// Entry in the doctors directory shown to patients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoctorSummary {
    pub id: AccountId,
    pub name: String,
    pub speciality: Option<String>,
    pub opd_fee: f64,
}

/// Patient as seen by an assigned doctor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientSummary {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub doctor: DoctorDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientRegistration {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingInput {
    pub doctor_id: AccountId,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

pub struct ClinicService {
    store: Arc<dyn Store>,
    auth: Arc<AuthSystem>,
}

impl ClinicService {
    pub fn new(store: Arc<dyn Store>, auth: Arc<AuthSystem>) -> Self {
        Self { store, auth }
    }

    /// Resolve the caller's account and check it still holds `role`.
    async fn caller(&self, identity: &Identity, role: Role) -> ClinicResult<Account> {
        let account = self.caller_any(identity).await?;
        if account.role != role {
            return Err(ClinicError::Forbidden(format!(
                "account role is {}, not {}",
                account.role, role
            )));
        }
        Ok(account)
    }

    /// Resolve the caller's account. A token minted before a role change is
    /// refused.
    async fn caller_any(&self, identity: &Identity) -> ClinicResult<Account> {
        let account = self
            .store
            .find_by_email(&identity.email)
            .await?
            .ok_or_else(|| ClinicError::not_found("account"))?;
        if account.role != identity.role {
            return Err(ClinicError::Forbidden(format!(
                "session role {} is out of date, sign in again",
                identity.role
            )));
        }
        Ok(account)
    }

    async fn member(&self, account: &Account) -> ClinicResult<MemberView> {
        let profile = self.store.profile(account.id).await?;
        Ok(MemberView::new(account, profile.as_ref()))
    }

    async fn members(&self, roles: &[Role]) -> ClinicResult<Vec<MemberView>> {
        let mut out = Vec::new();
        for role in roles {
            for account in self.store.list_by_role(*role).await? {
                out.push(self.member(&account).await?);
            }
        }
        Ok(out)
    }

    async fn staff_account(&self, id: AccountId) -> ClinicResult<Account> {
        match self.store.find_by_id(id).await? {
            Some(account) if account.role.is_staff() => Ok(account),
            _ => Err(ClinicError::not_found("employee")),
        }
    }

    /// A doctor may only see or treat patients they have an appointment with.
    async fn ensure_assigned(&self, doctor_id: AccountId, patient_id: AccountId) -> ClinicResult<()> {
        let assigned = self
            .store
            .appointments_for_doctor(doctor_id, None)
            .await?
            .iter()
            .any(|a| a.patient_id == patient_id);
        if assigned {
            Ok(())
        } else {
            Err(ClinicError::not_found("patient"))
        }
    }

    fn record(&self, event: AuditEventType, email: &str, detail: String) {
        self.auth
            .audit()
            .record(AuditEntry::new(event).with_email(email).with_detail(detail));
    }

    // Employees

    pub async fn add_employee(&self, request: EmployeeRequest) -> ClinicResult<Provisioned> {
        if request.role == Role::Patient {
            return Err(ClinicError::invalid("employees cannot have the PATIENT role"));
        }

        let provisioned = self
            .auth
            .provision(
                ProvisionRequest {
                    email: request.email,
                    name: request.name,
                    role: request.role,
                    phone_number: request.phone_number,
                    doctor: request.doctor,
                },
                CredentialDelivery::Email,
            )
            .await?;
        Ok(provisioned)
    }

    /// Doctors, then receptionists, then administrators.
    pub async fn list_employees(&self) -> ClinicResult<Vec<MemberView>> {
        self.members(&[Role::Doctor, Role::Receptionist, Role::Admin])
            .await
    }

    pub async fn employee(&self, id: AccountId) -> ClinicResult<MemberView> {
        let account = self.staff_account(id).await?;
        self.member(&account).await
    }

    pub async fn employees_by_role(&self, role: &str) -> ClinicResult<Vec<MemberView>> {
        let role: Role = role.parse()?;
        if role == Role::Patient {
            return Err(ClinicError::invalid("PATIENT is not an employee role"));
        }
        self.members(&[role]).await
    }

    /// Replace an employee's contact details and role. Doctor-only fields are
    /// dropped when the new role is not DOCTOR.
    pub async fn update_employee(
        &self,
        id: AccountId,
        request: EmployeeRequest,
    ) -> ClinicResult<MemberView> {
        if request.role == Role::Patient {
            return Err(ClinicError::invalid("employees cannot have the PATIENT role"));
        }
        let account = self.staff_account(id).await?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        let name = validate_name(&request.name)?;

        let profile = Profile::for_role(request.role, name, request.phone_number, request.doctor);
        let account = self
            .store
            .update_details(account.id, &email, request.role, profile)
            .await?;

        self.record(
            AuditEventType::AccountUpdated,
            &account.email,
            format!("employee {} updated", account.id),
        );
        info!(id = account.id, role = %account.role, "employee updated");
        self.member(&account).await
    }

    pub async fn delete_employee(&self, id: AccountId) -> ClinicResult<()> {
        let account = self.staff_account(id).await?;
        if account.role == Role::Admin {
            return Err(ClinicError::Forbidden(
                "administrator accounts cannot be deleted".to_string(),
            ));
        }

        self.store.delete_with_profile(account.id).await?;
        self.record(
            AuditEventType::AccountDeleted,
            &account.email,
            format!("employee {} deleted", account.id),
        );
        Ok(())
    }

    // Patients

    pub async fn list_patients(&self) -> ClinicResult<Vec<MemberView>> {
        self.members(&[Role::Patient]).await
    }

    pub async fn delete_patient(&self, id: AccountId) -> ClinicResult<()> {
        let account = match self.store.find_by_id(id).await? {
            Some(account) if account.role == Role::Patient => account,
            _ => return Err(ClinicError::not_found("patient")),
        };

        self.store.delete_with_profile(account.id).await?;
        self.record(
            AuditEventType::AccountDeleted,
            &account.email,
            format!("patient {} deleted", account.id),
        );
        Ok(())
    }

    /// Front-desk registration: ACTIVE immediately, password handed back.
    pub async fn register_patient(&self, request: PatientRegistration) -> ClinicResult<Provisioned> {
        let provisioned = self
            .auth
            .provision(
                ProvisionRequest {
                    email: request.email,
                    name: request.name,
                    role: Role::Patient,
                    phone_number: request.phone_number,
                    doctor: DoctorDetails::default(),
                },
                CredentialDelivery::ReturnToCaller,
            )
            .await?;
        Ok(provisioned)
    }

    pub async fn delete_own_record(&self, identity: &Identity) -> ClinicResult<()> {
        let account = self.caller(identity, Role::Patient).await?;
        self.store.delete_with_profile(account.id).await?;
        self.record(
            AuditEventType::AccountDeleted,
            &account.email,
            "patient deleted own record".to_string(),
        );
        Ok(())
    }

    pub async fn patient_profile(&self, identity: &Identity) -> ClinicResult<MemberView> {
        let account = self.caller(identity, Role::Patient).await?;
        self.member(&account).await
    }

    // Bookings

    pub async fn request_booking(
        &self,
        identity: &Identity,
        input: BookingInput,
    ) -> ClinicResult<BookingRequest> {
        let patient = self.caller(identity, Role::Patient).await?;
        match self.store.find_by_id(input.doctor_id).await? {
            Some(doctor) if doctor.role == Role::Doctor => {}
            _ => return Err(ClinicError::not_found("doctor")),
        }

        let booking = self
            .store
            .insert_booking(NewBooking {
                patient_id: patient.id,
                doctor_id: input.doctor_id,
                date: input.date,
                time: input.time,
            })
            .await?;
        info!(booking = booking.id, patient = patient.id, doctor = input.doctor_id, "booking requested");
        Ok(booking)
    }

    pub async fn my_bookings(&self, identity: &Identity) -> ClinicResult<Vec<BookingRequest>> {
        let patient = self.caller(identity, Role::Patient).await?;
        Ok(self.store.bookings_for_patient(patient.id).await?)
    }

    pub async fn pending_bookings(&self) -> ClinicResult<Vec<BookingRequest>> {
        Ok(self.store.bookings_with_status(BookingStatus::Pending).await?)
    }

    pub async fn approve_booking(&self, id: RecordId) -> ClinicResult<Appointment> {
        let (_, appointment) = self.store.decide_booking(id, true).await?;
        let appointment = appointment
            .ok_or_else(|| ClinicError::invalid("approval did not produce an appointment"))?;
        info!(booking = id, appointment = appointment.id, "booking approved");
        Ok(appointment)
    }

    pub async fn reject_booking(&self, id: RecordId) -> ClinicResult<BookingRequest> {
        let (booking, _) = self.store.decide_booking(id, false).await?;
        info!(booking = id, "booking rejected");
        Ok(booking)
    }

    // Appointments

    pub async fn doctor_appointments(
        &self,
        identity: &Identity,
        date: Option<NaiveDate>,
    ) -> ClinicResult<Vec<Appointment>> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        Ok(self.store.appointments_for_doctor(doctor.id, date).await?)
    }

    /// Only the assigned doctor can change an appointment; anyone else sees
    /// NotFound.
    pub async fn update_appointment_status(
        &self,
        identity: &Identity,
        id: RecordId,
        status: &str,
    ) -> ClinicResult<Appointment> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        match self.store.appointment(id).await? {
            Some(appointment) if appointment.doctor_id == doctor.id => {}
            _ => return Err(ClinicError::not_found("appointment")),
        }

        let status: AppointmentStatus = status.parse()?;
        Ok(self.store.set_appointment_status(id, status).await?)
    }

    pub async fn assigned_patients(&self, identity: &Identity) -> ClinicResult<Vec<PatientSummary>> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        let appointments = self.store.appointments_for_doctor(doctor.id, None).await?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for appointment in appointments {
            if !seen.insert(appointment.patient_id) {
                continue;
            }
            let Some(patient) = self.store.find_by_id(appointment.patient_id).await? else {
                continue;
            };
            let profile = self.store.profile(patient.id).await?;
            out.push(PatientSummary {
                id: patient.id,
                name: profile.as_ref().map(|p| p.name().to_string()).unwrap_or_default(),
                email: patient.email,
                phone_number: profile
                    .as_ref()
                    .and_then(|p| p.phone_number())
                    .unwrap_or("N/A")
                    .to_string(),
            });
        }
        Ok(out)
    }

    pub async fn patient_visit_history(
        &self,
        identity: &Identity,
        patient_id: AccountId,
    ) -> ClinicResult<Vec<Appointment>> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        self.ensure_assigned(doctor.id, patient_id).await?;
        Ok(self.store.appointments_for_patient(patient_id).await?)
    }

    pub async fn medical_history(&self, identity: &Identity) -> ClinicResult<Vec<Appointment>> {
        let patient = self.caller(identity, Role::Patient).await?;
        Ok(self.store.appointments_for_patient(patient.id).await?)
    }

    // Prescriptions

    pub async fn create_prescription(
        &self,
        identity: &Identity,
        patient_id: AccountId,
        content: &str,
    ) -> ClinicResult<Prescription> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ClinicError::invalid("prescription content is required"));
        }
        self.ensure_assigned(doctor.id, patient_id).await?;

        let prescription = self
            .store
            .insert_prescription(NewPrescription {
                doctor_id: doctor.id,
                patient_id,
                content: content.to_string(),
            })
            .await?;
        info!(prescription = prescription.id, doctor = doctor.id, patient = patient_id, "prescription created");
        Ok(prescription)
    }

    pub async fn my_prescriptions(&self, identity: &Identity) -> ClinicResult<Vec<Prescription>> {
        let patient = self.caller(identity, Role::Patient).await?;
        Ok(self.store.prescriptions_for_patient(patient.id).await?)
    }

    pub async fn patient_prescriptions(
        &self,
        identity: &Identity,
        patient_id: AccountId,
    ) -> ClinicResult<Vec<Prescription>> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        self.ensure_assigned(doctor.id, patient_id).await?;
        Ok(self.store.prescriptions_for_patient(patient_id).await?)
    }

    // Doctors

    pub async fn doctors(&self) -> ClinicResult<Vec<DoctorSummary>> {
        let mut out = Vec::new();
        for account in self.store.list_by_role(Role::Doctor).await? {
            let profile = self.store.profile(account.id).await?;
            let doctor = profile.as_ref().and_then(Profile::as_doctor);
            out.push(DoctorSummary {
                id: account.id,
                name: profile.as_ref().map(|p| p.name().to_string()).unwrap_or_default(),
                speciality: doctor.and_then(|d| d.speciality.clone()),
                opd_fee: doctor.map_or(0.0, |d| d.opd_fee),
            });
        }
        Ok(out)
    }

    pub async fn doctor_profile(&self, identity: &Identity) -> ClinicResult<MemberView> {
        let doctor = self.caller(identity, Role::Doctor).await?;
        self.member(&doctor).await
    }

    // Chat

    async fn first_admin(&self) -> ClinicResult<Account> {
        self.store
            .first_admin()
            .await?
            .ok_or_else(|| ClinicError::not_found("administrator"))
    }

    /// Non-admins always write to the first administrator; administrators must
    /// name a receiver.
    pub async fn send_message(
        &self,
        identity: &Identity,
        content: &str,
        receiver_id: Option<AccountId>,
    ) -> ClinicResult<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClinicError::invalid("message content is required"));
        }

        let sender = self.caller_any(identity).await?;
        let receiver_id = if sender.role == Role::Admin {
            let receiver_id =
                receiver_id.ok_or_else(|| ClinicError::invalid("receiver_id is required"))?;
            if self.store.find_by_id(receiver_id).await?.is_none() {
                return Err(ClinicError::not_found("receiver"));
            }
            receiver_id
        } else {
            self.first_admin().await?.id
        };

        Ok(self
            .store
            .insert_message(sender.id, receiver_id, content.to_string())
            .await?)
    }

    /// Caller's thread with the first administrator, oldest first.
    pub async fn chat_history(&self, identity: &Identity) -> ClinicResult<Vec<ChatMessage>> {
        let caller = self.caller_any(identity).await?;
        let admin = self.first_admin().await?;
        Ok(self.store.messages_between(caller.id, admin.id).await?)
    }

    pub async fn conversation(
        &self,
        identity: &Identity,
        other_id: AccountId,
    ) -> ClinicResult<Vec<ChatMessage>> {
        let admin = self.caller(identity, Role::Admin).await?;
        Ok(self.store.messages_between(admin.id, other_id).await?)
    }

    pub async fn inbox(&self, identity: &Identity) -> ClinicResult<Vec<InboxEntry>> {
        let admin = self.caller(identity, Role::Admin).await?;
        let messages = self.store.messages_involving(admin.id).await?;

        let mut out = Vec::new();
        for (other, last) in latest_per_counterparty(admin.id, &messages) {
            let patient_name = match self.store.profile(other).await? {
                Some(Profile::Patient(p)) => p.name,
                _ => UNKNOWN_PATIENT.to_string(),
            };
            out.push(InboxEntry {
                patient_id: other,
                patient_name,
                last_message: last.content.clone(),
                last_message_time: last.sent_at,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthSettings;
    use crate::error::AuthError;
    use crate::notify::Outbox;
    use crate::store::{AccountStore, ClinicStore, MemoryStore};

    struct Fixture {
        clinic: ClinicService,
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(Outbox::new());
        let settings = AuthSettings {
            jwt_secret: "test_secret_key_for_jwt_signing_32b!".to_string(),
            password_hash_cost: 4,
            ..AuthSettings::default()
        };
        let auth = Arc::new(
            AuthSystem::new(&settings, "http://localhost:8080", store.clone(), outbox.clone())
                .unwrap(),
        );
        Fixture {
            clinic: ClinicService::new(store.clone(), auth),
            store,
            outbox,
        }
    }

    fn identity(email: &str, role: Role) -> Identity {
        Identity {
            email: email.to_string(),
            role,
        }
    }

    fn employee(email: &str, role: Role) -> EmployeeRequest {
        EmployeeRequest {
            email: email.to_string(),
            name: format!("{} person", role),
            role,
            phone_number: Some("9800000000".to_string()),
            doctor: DoctorDetails {
                nmc_number: Some("NMC-7".to_string()),
                speciality: Some("Ortho".to_string()),
                opd_fee: 400.0,
            },
        }
    }

    async fn add(f: &Fixture, email: &str, role: Role) -> AccountId {
        f.clinic.add_employee(employee(email, role)).await.unwrap().account.id
    }

    async fn patient(f: &Fixture, email: &str, name: &str) -> AccountId {
        f.clinic
            .register_patient(PatientRegistration {
                email: email.to_string(),
                name: name.to_string(),
                phone_number: None,
            })
            .await
            .unwrap()
            .account
            .id
    }

    async fn scheduled(f: &Fixture, patient_email: &str, doctor_id: AccountId) -> Appointment {
        let booking = f
            .clinic
            .request_booking(
                &identity(patient_email, Role::Patient),
                BookingInput {
                    doctor_id,
                    date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                    time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                },
            )
            .await
            .unwrap();
        f.clinic.approve_booking(booking.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_employee_rejects_patient_role() {
        let f = fixture();
        let err = f
            .clinic
            .add_employee(employee("p@example.com", Role::Patient))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_employee_directory() {
        let f = fixture();
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        add(&f, "rec@example.com", Role::Receptionist).await;
        patient(&f, "pat@example.com", "Pat").await;

        let all = f.clinic.list_employees().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].role, Role::Doctor);
        assert_eq!(all[0].opd_fee, 400.0);
        assert_eq!(all[1].nmc_number, None);

        assert_eq!(f.clinic.employee(doc).await.unwrap().email, "doc@example.com");
        assert_eq!(f.clinic.employees_by_role("receptionist").await.unwrap().len(), 1);
        assert!(f.clinic.employees_by_role("PATIENT").await.is_err());
        assert!(f.clinic.employees_by_role("janitor").await.is_err());

        let patients = f.clinic.list_patients().await.unwrap();
        assert_eq!(patients.len(), 1);
        assert!(f.clinic.employee(patients[0].id).await.is_err());
        assert!(f.outbox.last_to("doc@example.com").is_some());
    }

    #[tokio::test]
    async fn test_update_employee_clears_doctor_fields_and_checks_email() {
        let f = fixture();
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        add(&f, "taken@example.com", Role::Receptionist).await;

        let mut change = employee("doc2@example.com", Role::Receptionist);
        change.name = "Now Front Desk".into();
        let updated = f.clinic.update_employee(doc, change).await.unwrap();
        assert_eq!(updated.role, Role::Receptionist);
        assert_eq!(updated.email, "doc2@example.com");
        assert_eq!(updated.nmc_number, None);
        assert_eq!(updated.opd_fee, 0.0);

        let err = f
            .clinic
            .update_employee(doc, employee("taken@example.com", Role::Receptionist))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::Auth(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_admin_cannot_be_deleted() {
        let f = fixture();
        let admin = add(&f, "boss@example.com", Role::Admin).await;
        let rec = add(&f, "rec@example.com", Role::Receptionist).await;

        assert!(matches!(
            f.clinic.delete_employee(admin).await,
            Err(ClinicError::Forbidden(_))
        ));
        f.clinic.delete_employee(rec).await.unwrap();
        assert!(f.store.find_by_id(rec).await.unwrap().is_none());
        assert!(matches!(
            f.clinic.delete_employee(rec).await,
            Err(ClinicError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_receptionist_registered_patient_can_log_in() {
        let f = fixture();
        let provisioned = f
            .clinic
            .register_patient(PatientRegistration {
                email: "walkin@example.com".into(),
                name: "Walk In".into(),
                phone_number: Some("123".into()),
            })
            .await
            .unwrap();
        assert!(provisioned.account.enabled);
        // Password is handed back rather than mailed.
        assert!(f.outbox.messages().is_empty());

        let profile = f
            .clinic
            .patient_profile(&identity("walkin@example.com", Role::Patient))
            .await
            .unwrap();
        assert_eq!(profile.name, "Walk In");
    }

    #[tokio::test]
    async fn test_booking_flow() {
        let f = fixture();
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        let rec = add(&f, "rec@example.com", Role::Receptionist).await;
        patient(&f, "pat@example.com", "Pat").await;
        let pat = identity("pat@example.com", Role::Patient);

        let bad = f
            .clinic
            .request_booking(
                &pat,
                BookingInput {
                    doctor_id: rec,
                    date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
                    time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                },
            )
            .await;
        assert!(matches!(bad, Err(ClinicError::NotFound(_))));

        let appointment = scheduled(&f, "pat@example.com", doc).await;
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(f.clinic.my_bookings(&pat).await.unwrap()[0].status, BookingStatus::Approved);
        assert!(f.clinic.pending_bookings().await.unwrap().is_empty());

        let booking_id = appointment.booking_id.unwrap();
        assert!(f.clinic.reject_booking(booking_id).await.is_err());
    }

    #[tokio::test]
    async fn test_appointment_status_only_by_owner() {
        let f = fixture();
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        add(&f, "other@example.com", Role::Doctor).await;
        patient(&f, "pat@example.com", "Pat").await;
        let appointment = scheduled(&f, "pat@example.com", doc).await;

        let other = identity("other@example.com", Role::Doctor);
        assert!(matches!(
            f.clinic
                .update_appointment_status(&other, appointment.id, "COMPLETED")
                .await,
            Err(ClinicError::NotFound(_))
        ));

        let owner = identity("doc@example.com", Role::Doctor);
        assert!(matches!(
            f.clinic
                .update_appointment_status(&owner, appointment.id, "finished")
                .await,
            Err(ClinicError::InvalidInput(_))
        ));
        let updated = f
            .clinic
            .update_appointment_status(&owner, appointment.id, "completed")
            .await
            .unwrap();
        assert_eq!(updated.status, AppointmentStatus::Completed);

        let on_day = f
            .clinic
            .doctor_appointments(&owner, NaiveDate::from_ymd_opt(2026, 5, 4))
            .await
            .unwrap();
        assert_eq!(on_day.len(), 1);
        let other_day = f
            .clinic
            .doctor_appointments(&owner, NaiveDate::from_ymd_opt(2026, 5, 5))
            .await
            .unwrap();
        assert!(other_day.is_empty());
    }

    #[tokio::test]
    async fn test_prescriptions_require_assignment() {
        let f = fixture();
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        let pat_id = patient(&f, "pat@example.com", "Pat").await;
        let stranger = patient(&f, "stranger@example.com", "Stranger").await;
        scheduled(&f, "pat@example.com", doc).await;
        let doctor = identity("doc@example.com", Role::Doctor);

        assert!(matches!(
            f.clinic.create_prescription(&doctor, stranger, "Rest").await,
            Err(ClinicError::NotFound(_))
        ));
        assert!(matches!(
            f.clinic.create_prescription(&doctor, pat_id, "   ").await,
            Err(ClinicError::InvalidInput(_))
        ));

        f.clinic
            .create_prescription(&doctor, pat_id, "Paracetamol 500mg")
            .await
            .unwrap();
        let mine = f
            .clinic
            .my_prescriptions(&identity("pat@example.com", Role::Patient))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "Paracetamol 500mg");

        let assigned = f.clinic.assigned_patients(&doctor).await.unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].phone_number, "N/A");
        assert_eq!(
            f.clinic.patient_visit_history(&doctor, pat_id).await.unwrap().len(),
            1
        );
        assert!(f.clinic.patient_prescriptions(&doctor, stranger).await.is_err());
    }

    #[tokio::test]
    async fn test_patient_self_delete_removes_account_and_profile() {
        let f = fixture();
        let id = patient(&f, "bye@example.com", "Bye").await;
        f.clinic
            .delete_own_record(&identity("bye@example.com", Role::Patient))
            .await
            .unwrap();
        assert!(f.store.find_by_id(id).await.unwrap().is_none());
        assert!(f.store.profile(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chat_routes_to_first_admin() {
        let f = fixture();
        let admin_id = add(&f, "admin@example.com", Role::Admin).await;
        let pat_id = patient(&f, "pat@example.com", "Pat").await;
        let doc_id = add(&f, "doc@example.com", Role::Doctor).await;
        let pat = identity("pat@example.com", Role::Patient);
        let admin = identity("admin@example.com", Role::Admin);

        assert!(matches!(
            f.clinic.send_message(&pat, "  ", None).await,
            Err(ClinicError::InvalidInput(_))
        ));

        let sent = f.clinic.send_message(&pat, "hello", None).await.unwrap();
        assert_eq!(sent.receiver_id, admin_id);
        f.clinic
            .send_message(&identity("doc@example.com", Role::Doctor), "hi admin", None)
            .await
            .unwrap();

        assert!(f.clinic.send_message(&admin, "reply", None).await.is_err());
        f.clinic
            .send_message(&admin, "reply", Some(pat_id))
            .await
            .unwrap();

        let history = f.clinic.chat_history(&pat).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "reply");

        let thread = f.clinic.conversation(&admin, pat_id).await.unwrap();
        assert_eq!(thread.len(), 2);
        assert!(matches!(
            f.clinic.conversation(&pat, admin_id).await,
            Err(ClinicError::Forbidden(_))
        ));

        let inbox = f.clinic.inbox(&admin).await.unwrap();
        assert_eq!(inbox.len(), 2);
        let pat_row = inbox.iter().find(|r| r.patient_id == pat_id).unwrap();
        assert_eq!(pat_row.patient_name, "Pat");
        assert_eq!(pat_row.last_message, "reply");
        let doc_row = inbox.iter().find(|r| r.patient_id == doc_id).unwrap();
        assert_eq!(doc_row.patient_name, UNKNOWN_PATIENT);
    }

    #[tokio::test]
    async fn test_stale_role_is_forbidden() {
        let f = fixture();
        add(&f, "admin@example.com", Role::Admin).await;
        let doc = add(&f, "doc@example.com", Role::Doctor).await;
        let stale = identity("doc@example.com", Role::Doctor);

        f.clinic
            .update_employee(doc, employee("doc@example.com", Role::Receptionist))
            .await
            .unwrap();

        assert!(matches!(
            f.clinic.send_message(&stale, "still a doctor?", None).await,
            Err(ClinicError::Forbidden(_))
        ));
        assert!(matches!(
            f.clinic.chat_history(&stale).await,
            Err(ClinicError::Forbidden(_))
        ));
        assert!(matches!(
            f.clinic.doctor_profile(&stale).await,
            Err(ClinicError::Forbidden(_))
        ));

        let current = identity("doc@example.com", Role::Receptionist);
        f.clinic.send_message(&current, "hello", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_without_admin_is_not_found() {
        let f = fixture();
        patient(&f, "pat@example.com", "Pat").await;
        assert!(matches!(
            f.clinic
                .send_message(&identity("pat@example.com", Role::Patient), "hi", None)
                .await,
            Err(ClinicError::NotFound(_))
        ));
    }
}
