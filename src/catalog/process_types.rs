use super::StepTypeId;

catalog_enum! {
    /// Workflow templates a process instance can follow.
    ProcessTypeId, "process type" {
        ApplicationChecklist = 1 => "APPLICATION_CHECKLIST",
        OfferSubscription = 2 => "OFFER_SUBSCRIPTION",
        ServiceAccountSync = 3 => "SERVICE_ACCOUNT_SYNC",
        CertificateApproval = 4 => "CERTIFICATE_APPROVAL",
        MembershipRegistration = 5 => "MEMBERSHIP_REGISTRATION",
    }
}

impl ProcessTypeId {
    /// Steps appended when a process of this type is created.
    pub fn initial_steps(self) -> &'static [StepTypeId] {
        match self {
            ProcessTypeId::ApplicationChecklist => &[StepTypeId::VerifyRegistration],
            ProcessTypeId::OfferSubscription => &[StepTypeId::TriggerProvider],
            ProcessTypeId::ServiceAccountSync => &[StepTypeId::SynchronizeServiceAccounts],
            ProcessTypeId::CertificateApproval => &[StepTypeId::VerifyCertificate],
            ProcessTypeId::MembershipRegistration => &[StepTypeId::SendMembershipRegistration],
        }
    }

    /// Every step type that may occur in a process of this type.
    pub fn step_types(self) -> Vec<StepTypeId> {
        StepTypeId::ALL
            .iter()
            .copied()
            .filter(|step_type| step_type.process_type() == self)
            .collect()
    }
}
