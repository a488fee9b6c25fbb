use super::ProcessTypeId;

catalog_enum! {
    /// Units of work. Labels follow the `X` / `RETRIGGER_X` / `DECLINE_X`
    /// convention for actions, their re-entry counterparts and the
    /// compensation step that closes a branch.
    StepTypeId, "step type" {
        VerifyRegistration = 1 => "VERIFY_REGISTRATION",
        CreateBusinessPartnerNumberPush = 2 => "CREATE_BUSINESS_PARTNER_NUMBER_PUSH",
        RetriggerBusinessPartnerNumberPush = 3 => "RETRIGGER_BUSINESS_PARTNER_NUMBER_PUSH",
        CreateIdentityWallet = 4 => "CREATE_IDENTITY_WALLET",
        RetriggerIdentityWallet = 5 => "RETRIGGER_IDENTITY_WALLET",
        StartClearingHouse = 6 => "START_CLEARING_HOUSE",
        RetriggerClearingHouse = 7 => "RETRIGGER_CLEARING_HOUSE",
        StartSelfDescriptionLp = 8 => "START_SELF_DESCRIPTION_LP",
        RetriggerSelfDescriptionLp = 9 => "RETRIGGER_SELF_DESCRIPTION_LP",
        ActivateApplication = 10 => "ACTIVATE_APPLICATION",
        RetriggerActivateApplication = 11 => "RETRIGGER_ACTIVATE_APPLICATION",
        DeclineApplication = 12 => "DECLINE_APPLICATION",
        TriggerProvider = 100 => "TRIGGER_PROVIDER",
        RetriggerProvider = 101 => "RETRIGGER_PROVIDER",
        StartAutosetup = 102 => "START_AUTOSETUP",
        ActivateSubscription = 103 => "ACTIVATE_SUBSCRIPTION",
        RetriggerActivateSubscription = 104 => "RETRIGGER_ACTIVATE_SUBSCRIPTION",
        TriggerProviderCallback = 105 => "TRIGGER_PROVIDER_CALLBACK",
        RetriggerProviderCallback = 106 => "RETRIGGER_PROVIDER_CALLBACK",
        DeclineSubscription = 107 => "DECLINE_SUBSCRIPTION",
        SynchronizeServiceAccounts = 200 => "SYNCHRONIZE_SERVICE_ACCOUNTS",
        RetriggerSynchronizeServiceAccounts = 201 => "RETRIGGER_SYNCHRONIZE_SERVICE_ACCOUNTS",
        VerifyCertificate = 300 => "VERIFY_CERTIFICATE",
        RetriggerVerifyCertificate = 301 => "RETRIGGER_VERIFY_CERTIFICATE",
        PublishCertificate = 302 => "PUBLISH_CERTIFICATE",
        RetriggerPublishCertificate = 303 => "RETRIGGER_PUBLISH_CERTIFICATE",
        DeclineCertificate = 304 => "DECLINE_CERTIFICATE",
        SendMembershipRegistration = 400 => "SEND_MEMBERSHIP_REGISTRATION",
        RetriggerSendMembershipRegistration = 401 => "RETRIGGER_SEND_MEMBERSHIP_REGISTRATION",
        ConfirmMembership = 402 => "CONFIRM_MEMBERSHIP",
        RetriggerConfirmMembership = 403 => "RETRIGGER_CONFIRM_MEMBERSHIP",
        DeclineMembershipRegistration = 404 => "DECLINE_MEMBERSHIP_REGISTRATION",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    Action,
    Retrigger { action: StepTypeId },
    Decline,
}

impl StepTypeId {
    pub fn process_type(self) -> ProcessTypeId {
        use StepTypeId::*;
        match self {
            VerifyRegistration
            | CreateBusinessPartnerNumberPush
            | RetriggerBusinessPartnerNumberPush
            | CreateIdentityWallet
            | RetriggerIdentityWallet
            | StartClearingHouse
            | RetriggerClearingHouse
            | StartSelfDescriptionLp
            | RetriggerSelfDescriptionLp
            | ActivateApplication
            | RetriggerActivateApplication
            | DeclineApplication => ProcessTypeId::ApplicationChecklist,
            TriggerProvider
            | RetriggerProvider
            | StartAutosetup
            | ActivateSubscription
            | RetriggerActivateSubscription
            | TriggerProviderCallback
            | RetriggerProviderCallback
            | DeclineSubscription => ProcessTypeId::OfferSubscription,
            SynchronizeServiceAccounts | RetriggerSynchronizeServiceAccounts => {
                ProcessTypeId::ServiceAccountSync
            }
            VerifyCertificate
            | RetriggerVerifyCertificate
            | PublishCertificate
            | RetriggerPublishCertificate
            | DeclineCertificate => ProcessTypeId::CertificateApproval,
            SendMembershipRegistration
            | RetriggerSendMembershipRegistration
            | ConfirmMembership
            | RetriggerConfirmMembership
            | DeclineMembershipRegistration => ProcessTypeId::MembershipRegistration,
        }
    }

    pub fn role(self) -> StepRole {
        use StepTypeId::*;
        match self {
            RetriggerBusinessPartnerNumberPush => StepRole::Retrigger {
                action: CreateBusinessPartnerNumberPush,
            },
            RetriggerIdentityWallet => StepRole::Retrigger {
                action: CreateIdentityWallet,
            },
            RetriggerClearingHouse => StepRole::Retrigger {
                action: StartClearingHouse,
            },
            RetriggerSelfDescriptionLp => StepRole::Retrigger {
                action: StartSelfDescriptionLp,
            },
            RetriggerActivateApplication => StepRole::Retrigger {
                action: ActivateApplication,
            },
            RetriggerProvider => StepRole::Retrigger {
                action: TriggerProvider,
            },
            RetriggerActivateSubscription => StepRole::Retrigger {
                action: ActivateSubscription,
            },
            RetriggerProviderCallback => StepRole::Retrigger {
                action: TriggerProviderCallback,
            },
            RetriggerSynchronizeServiceAccounts => StepRole::Retrigger {
                action: SynchronizeServiceAccounts,
            },
            RetriggerVerifyCertificate => StepRole::Retrigger {
                action: VerifyCertificate,
            },
            RetriggerPublishCertificate => StepRole::Retrigger {
                action: PublishCertificate,
            },
            RetriggerSendMembershipRegistration => StepRole::Retrigger {
                action: SendMembershipRegistration,
            },
            RetriggerConfirmMembership => StepRole::Retrigger {
                action: ConfirmMembership,
            },
            DeclineApplication
            | DeclineSubscription
            | DeclineCertificate
            | DeclineMembershipRegistration => StepRole::Decline,
            VerifyRegistration
            | CreateBusinessPartnerNumberPush
            | CreateIdentityWallet
            | StartClearingHouse
            | StartSelfDescriptionLp
            | ActivateApplication
            | TriggerProvider
            | StartAutosetup
            | ActivateSubscription
            | TriggerProviderCallback
            | SynchronizeServiceAccounts
            | VerifyCertificate
            | PublishCertificate
            | SendMembershipRegistration
            | ConfirmMembership => StepRole::Action,
        }
    }

    /// The semantic action a step performs; retrigger steps map to the action
    /// they re-attempt, everything else maps to itself.
    pub fn action(self) -> StepTypeId {
        match self.role() {
            StepRole::Retrigger { action } => action,
            StepRole::Action | StepRole::Decline => self,
        }
    }

    pub fn is_decline(self) -> bool {
        self.role() == StepRole::Decline
    }

    /// The `RETRIGGER_*` counterpart of this step's action, if the action may
    /// be re-entered after a transient failure.
    pub fn retrigger(self) -> Option<StepTypeId> {
        use StepTypeId::*;
        match self.action() {
            CreateBusinessPartnerNumberPush => Some(RetriggerBusinessPartnerNumberPush),
            CreateIdentityWallet => Some(RetriggerIdentityWallet),
            StartClearingHouse => Some(RetriggerClearingHouse),
            StartSelfDescriptionLp => Some(RetriggerSelfDescriptionLp),
            ActivateApplication => Some(RetriggerActivateApplication),
            TriggerProvider => Some(RetriggerProvider),
            ActivateSubscription => Some(RetriggerActivateSubscription),
            TriggerProviderCallback => Some(RetriggerProviderCallback),
            SynchronizeServiceAccounts => Some(RetriggerSynchronizeServiceAccounts),
            VerifyCertificate => Some(RetriggerVerifyCertificate),
            PublishCertificate => Some(RetriggerPublishCertificate),
            SendMembershipRegistration => Some(RetriggerSendMembershipRegistration),
            ConfirmMembership => Some(RetriggerConfirmMembership),
            VerifyRegistration | StartAutosetup => None,
            DeclineApplication
            | DeclineSubscription
            | DeclineCertificate
            | DeclineMembershipRegistration => None,
            RetriggerBusinessPartnerNumberPush
            | RetriggerIdentityWallet
            | RetriggerClearingHouse
            | RetriggerSelfDescriptionLp
            | RetriggerActivateApplication
            | RetriggerProvider
            | RetriggerActivateSubscription
            | RetriggerProviderCallback
            | RetriggerSynchronizeServiceAccounts
            | RetriggerVerifyCertificate
            | RetriggerPublishCertificate
            | RetriggerSendMembershipRegistration
            | RetriggerConfirmMembership => None,
        }
    }

    /// The `DECLINE_*` step that terminates this step's branch, if any.
    pub fn decline(self) -> Option<StepTypeId> {
        if self.is_decline() {
            return None;
        }
        match self.process_type() {
            ProcessTypeId::ApplicationChecklist => Some(StepTypeId::DeclineApplication),
            ProcessTypeId::OfferSubscription => Some(StepTypeId::DeclineSubscription),
            ProcessTypeId::CertificateApproval => Some(StepTypeId::DeclineCertificate),
            ProcessTypeId::MembershipRegistration => {
                Some(StepTypeId::DeclineMembershipRegistration)
            }
            ProcessTypeId::ServiceAccountSync => None,
        }
    }

    /// Steps appended once this step completes successfully. A retrigger step
    /// continues the workflow exactly as its action would have.
    pub fn follow_on(self) -> &'static [StepTypeId] {
        use StepTypeId::*;
        match self.action() {
            VerifyRegistration => &[CreateBusinessPartnerNumberPush],
            CreateBusinessPartnerNumberPush => &[CreateIdentityWallet],
            CreateIdentityWallet => &[StartClearingHouse],
            StartClearingHouse => &[StartSelfDescriptionLp],
            StartSelfDescriptionLp => &[ActivateApplication],
            TriggerProvider => &[StartAutosetup],
            StartAutosetup => &[ActivateSubscription],
            ActivateSubscription => &[TriggerProviderCallback],
            VerifyCertificate => &[PublishCertificate],
            SendMembershipRegistration => &[ConfirmMembership],
            ActivateApplication
            | TriggerProviderCallback
            | SynchronizeServiceAccounts
            | PublishCertificate
            | ConfirmMembership => &[],
            DeclineApplication
            | DeclineSubscription
            | DeclineCertificate
            | DeclineMembershipRegistration => &[],
            RetriggerBusinessPartnerNumberPush
            | RetriggerIdentityWallet
            | RetriggerClearingHouse
            | RetriggerSelfDescriptionLp
            | RetriggerActivateApplication
            | RetriggerProvider
            | RetriggerActivateSubscription
            | RetriggerProviderCallback
            | RetriggerSynchronizeServiceAccounts
            | RetriggerVerifyCertificate
            | RetriggerPublishCertificate
            | RetriggerSendMembershipRegistration
            | RetriggerConfirmMembership => &[],
        }
    }
}
