//! The workflow transition table.
//!
//! [`check`] decides whether `actor` may apply a transition to the estimate
//! as currently read, and returns the guard the repository must see still
//! holding when it writes. Checks run in a fixed order: role, then identity
//! (is this the assigned supervisor, a dispatched freelancer, the owning
//! customer), then state.

use crate::model::estimate::{
    CustomerResponseStatus, Estimate, EstimateStatus, SupervisorProgress,
};
use crate::model::estimate_change::{EstimateChange, EstimateGuard};
use crate::model::user::{Actor, Role};
use crate::util::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    AssignSupervisor,
    DispatchToFreelancers,
    SubmitQuotation,
    CreateFinalQuotation,
    ApproveFinalQuotation,
    CustomerResponse(CustomerResponseStatus),
    ConvertToDeal,
    Cancel,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::AssignSupervisor => "assign_supervisor",
            Transition::DispatchToFreelancers => "dispatch_to_freelancers",
            Transition::SubmitQuotation => "submit_quotation",
            Transition::CreateFinalQuotation => "create_final_quotation",
            Transition::ApproveFinalQuotation => "approve_final_quotation",
            Transition::CustomerResponse(_) => "customer_response",
            Transition::ConvertToDeal => "convert_to_deal",
            Transition::Cancel => "cancel",
        }
    }

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Transition::AssignSupervisor | Transition::ApproveFinalQuotation => &[Role::Superadmin],
            Transition::DispatchToFreelancers | Transition::CreateFinalQuotation => &[Role::Supervisor],
            Transition::SubmitQuotation => &[Role::Freelancer],
            Transition::CustomerResponse(_) => &[Role::Customer],
            Transition::ConvertToDeal | Transition::Cancel => &[Role::Superadmin, Role::Admin],
        }
    }

    /// Status the estimate ends in, when the transition moves the status.
    pub fn target(&self) -> Option<EstimateStatus> {
        match self {
            Transition::AssignSupervisor => Some(EstimateStatus::Assigned),
            Transition::DispatchToFreelancers | Transition::SubmitQuotation => None,
            Transition::CreateFinalQuotation => Some(EstimateStatus::FinalCreated),
            Transition::ApproveFinalQuotation => Some(EstimateStatus::SuperadminApproved),
            Transition::CustomerResponse(response) => Some(response.resulting_status()),
            Transition::ConvertToDeal => Some(EstimateStatus::Deal),
            Transition::Cancel => Some(EstimateStatus::Cancelled),
        }
    }
}

impl Transition {
    /// Whether `change` is the state change this transition applies.
    pub fn produces(&self, change: &EstimateChange) -> bool {
        match (self, change) {
            (Transition::CustomerResponse(response), EstimateChange::RecordCustomerResponse { status, .. }) => {
                *status == response.resulting_status()
            }
            (Transition::AssignSupervisor, EstimateChange::AssignSupervisor { .. })
            | (Transition::DispatchToFreelancers, EstimateChange::DispatchToFreelancers { .. })
            | (Transition::SubmitQuotation, EstimateChange::RecordFreelancerQuotation { .. })
            | (Transition::CreateFinalQuotation, EstimateChange::AttachFinalQuotation { .. })
            | (Transition::ApproveFinalQuotation, EstimateChange::ApproveFinalQuotation)
            | (Transition::ConvertToDeal, EstimateChange::ConvertToDeal { .. })
            | (Transition::Cancel, EstimateChange::Cancel { .. }) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn require_status(estimate: &Estimate, expected: EstimateStatus) -> Result<(), ServiceError> {
    if estimate.status == expected {
        Ok(())
    } else {
        Err(ServiceError::precondition(
            format!("status == {}", expected),
            format!("status == {}", estimate.status),
        ))
    }
}

fn require_progress(estimate: &Estimate, expected: SupervisorProgress) -> Result<(), ServiceError> {
    if estimate.supervisor_progress == expected {
        Ok(())
    } else {
        Err(ServiceError::precondition(
            format!("supervisor_progress == {}", expected),
            format!("supervisor_progress == {}", estimate.supervisor_progress),
        ))
    }
}

fn require_assigned(estimate: &Estimate, actor: &Actor) -> Result<(), ServiceError> {
    if estimate.is_assigned_to(&actor.id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "supervisor {} is not assigned to estimate {}",
            actor.id, estimate.id
        )))
    }
}

/// Validates `transition` for `actor` against the estimate as read and
/// returns the compare-and-swap guard for the write.
pub fn check(estimate: &Estimate, transition: Transition, actor: &Actor) -> Result<EstimateGuard, ServiceError> {
    if !transition.allowed_roles().contains(&actor.role) {
        return Err(ServiceError::Forbidden(format!(
            "role {} cannot {}",
            actor.role, transition
        )));
    }

    match transition {
        Transition::AssignSupervisor => {
            require_status(estimate, EstimateStatus::Pending)?;
            Ok(EstimateGuard::status(EstimateStatus::Pending))
        }
        Transition::DispatchToFreelancers => {
            require_assigned(estimate, actor)?;
            require_status(estimate, EstimateStatus::Assigned)?;
            require_progress(estimate, SupervisorProgress::NotStarted)?;
            Ok(EstimateGuard::status(EstimateStatus::Assigned)
                .with_supervisor_progress(SupervisorProgress::NotStarted))
        }
        Transition::SubmitQuotation => {
            if !estimate.is_dispatched_to(&actor.id) {
                return Err(ServiceError::Forbidden(format!(
                    "estimate {} was not sent to freelancer {}",
                    estimate.id, actor.id
                )));
            }
            if estimate.has_submitted(&actor.id) {
                return Err(ServiceError::DuplicateSubmission(format!(
                    "freelancer {} already quoted estimate {}",
                    actor.id, estimate.id
                )));
            }
            require_status(estimate, EstimateStatus::Assigned)?;
            require_progress(estimate, SupervisorProgress::RequestSent)?;
            Ok(EstimateGuard::status(EstimateStatus::Assigned)
                .with_supervisor_progress(SupervisorProgress::RequestSent)
                .freelancer_not_submitted(actor.id))
        }
        Transition::CreateFinalQuotation => {
            require_assigned(estimate, actor)?;
            require_status(estimate, EstimateStatus::Assigned)?;
            require_progress(estimate, SupervisorProgress::RequestCompleted)?;
            Ok(EstimateGuard::status(EstimateStatus::Assigned)
                .with_supervisor_progress(SupervisorProgress::RequestCompleted))
        }
        Transition::ApproveFinalQuotation => {
            require_status(estimate, EstimateStatus::FinalCreated)?;
            Ok(EstimateGuard::status(EstimateStatus::FinalCreated))
        }
        Transition::CustomerResponse(_) => {
            if estimate.customer != actor.id {
                return Err(ServiceError::Forbidden(format!(
                    "estimate {} belongs to another customer",
                    estimate.id
                )));
            }
            require_status(estimate, EstimateStatus::SuperadminApproved)?;
            if let Some(previous) = estimate.customer_response.status {
                return Err(ServiceError::precondition(
                    "customer_response == none",
                    format!("customer_response == {:?}", previous).to_lowercase(),
                ));
            }
            Ok(EstimateGuard::status(EstimateStatus::SuperadminApproved).awaiting_response())
        }
        Transition::ConvertToDeal => {
            if estimate.deal_converted_at.is_some() {
                return Err(ServiceError::AlreadyConverted(estimate.id.to_hex()));
            }
            require_status(estimate, EstimateStatus::CustomerAccepted)?;
            Ok(EstimateGuard::status(EstimateStatus::CustomerAccepted).not_converted())
        }
        Transition::Cancel => {
            if !estimate.status.is_cancellable() {
                return Err(ServiceError::precondition(
                    "status in [pending, assigned, final_created, superadmin_approved]",
                    format!("status == {}", estimate.status),
                ));
            }
            Ok(EstimateGuard::status(estimate.status))
        }
    }
}

/// [`check`] plus the change to write under the returned guard.
pub fn plan(
    estimate: &Estimate,
    transition: Transition,
    actor: &Actor,
    change: EstimateChange,
) -> Result<(EstimateGuard, EstimateChange), ServiceError> {
    if !transition.produces(&change) {
        return Err(ServiceError::InternalError(format!(
            "{} cannot apply {}",
            transition,
            change.name()
        )));
    }
    let guard = check(estimate, transition, actor)?;
    Ok((guard, change))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::estimate::{LeadType, MobileNumber, NewEstimate};
    use bson::oid::ObjectId;
    use chrono::Utc;

    fn estimate(customer: ObjectId) -> Estimate {
        Estimate::pending(
            NewEstimate {
                customer,
                customer_name: "Sara Khan".to_string(),
                customer_email: "sara@example.com".to_string(),
                customer_mobile: MobileNumber {
                    country_code: "+971".to_string(),
                    number: "501112222".to_string(),
                },
                category: ObjectId::new(),
                subcategories: vec![],
                description: "Kitchen refit".to_string(),
                attachments: vec![],
                lead_type: LeadType::Sales,
            },
            Utc::now(),
        )
    }

    fn actor(role: Role) -> Actor {
        Actor::new(ObjectId::new(), role)
    }

    #[test]
    fn role_is_checked_before_state() {
        let mut e = estimate(ObjectId::new());
        e.status = EstimateStatus::Deal;
        let err = check(&e, Transition::AssignSupervisor, &actor(Role::Admin)).unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn assign_requires_pending() {
        let mut e = estimate(ObjectId::new());
        let superadmin = actor(Role::Superadmin);
        let guard = check(&e, Transition::AssignSupervisor, &superadmin).unwrap();
        assert_eq!(guard, EstimateGuard::status(EstimateStatus::Pending));

        e.status = EstimateStatus::Assigned;
        let err = check(&e, Transition::AssignSupervisor, &superadmin).unwrap_err();
        assert_eq!(err, ServiceError::precondition("status == pending", "status == assigned"));
    }

    #[test]
    fn only_the_assigned_supervisor_dispatches() {
        let mut e = estimate(ObjectId::new());
        let supervisor = actor(Role::Supervisor);
        e.status = EstimateStatus::Assigned;
        e.assigned_supervisor = Some(supervisor.id);
        assert!(check(&e, Transition::DispatchToFreelancers, &supervisor).is_ok());
        let stranger = actor(Role::Supervisor);
        assert!(matches!(
            check(&e, Transition::DispatchToFreelancers, &stranger),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn final_quotation_waits_for_collection() {
        let mut e = estimate(ObjectId::new());
        let supervisor = actor(Role::Supervisor);
        e.status = EstimateStatus::Assigned;
        e.assigned_supervisor = Some(supervisor.id);
        e.supervisor_progress = SupervisorProgress::RequestSent;
        let err = check(&e, Transition::CreateFinalQuotation, &supervisor).unwrap_err();
        assert_eq!(
            err,
            ServiceError::precondition(
                "supervisor_progress == request_completed",
                "supervisor_progress == request_sent"
            )
        );
    }

    #[test]
    fn repeat_submission_is_a_duplicate() {
        let mut e = estimate(ObjectId::new());
        let freelancer = actor(Role::Freelancer);
        e.status = EstimateStatus::Assigned;
        e.supervisor_progress = SupervisorProgress::RequestSent;
        e.sent_to_freelancers = vec![freelancer.id];
        assert!(check(&e, Transition::SubmitQuotation, &freelancer).is_ok());
        e.freelancer_quotations.push(crate::model::estimate::FreelancerQuotation {
            freelancer: freelancer.id,
            quotation: ObjectId::new(),
            submitted_at: Utc::now(),
        });
        assert!(matches!(
            check(&e, Transition::SubmitQuotation, &freelancer),
            Err(ServiceError::DuplicateSubmission(_))
        ));
        assert!(matches!(
            check(&e, Transition::SubmitQuotation, &actor(Role::Freelancer)),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn customer_responds_once_to_own_estimate() {
        let customer = actor(Role::Customer);
        let mut e = estimate(customer.id);
        e.status = EstimateStatus::SuperadminApproved;
        let accept = Transition::CustomerResponse(CustomerResponseStatus::Accepted);
        assert!(check(&e, accept, &customer).is_ok());
        assert!(matches!(check(&e, accept, &actor(Role::Customer)), Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn converted_estimates_report_already_converted_first() {
        let mut e = estimate(ObjectId::new());
        e.status = EstimateStatus::Deal;
        e.deal_converted_at = Some(Utc::now());
        let err = check(&e, Transition::ConvertToDeal, &actor(Role::Admin)).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyConverted(_)));
    }

    #[test]
    fn rejected_estimates_cannot_convert() {
        let mut e = estimate(ObjectId::new());
        e.status = EstimateStatus::CustomerRejected;
        let err = check(&e, Transition::ConvertToDeal, &actor(Role::Superadmin)).unwrap_err();
        assert!(matches!(err, ServiceError::PreconditionFailed { .. }));
    }

    #[test]
    fn cancel_is_refused_once_accepted() {
        let mut e = estimate(ObjectId::new());
        let admin = actor(Role::Admin);
        assert_eq!(
            check(&e, Transition::Cancel, &admin).unwrap(),
            EstimateGuard::status(EstimateStatus::Pending)
        );
        e.status = EstimateStatus::CustomerAccepted;
        assert!(check(&e, Transition::Cancel, &admin).is_err());
    }

    #[test]
    fn every_target_is_a_successor_of_its_source() {
        let pairs = [
            (EstimateStatus::Pending, Transition::AssignSupervisor),
            (EstimateStatus::Assigned, Transition::CreateFinalQuotation),
            (EstimateStatus::FinalCreated, Transition::ApproveFinalQuotation),
            (
                EstimateStatus::SuperadminApproved,
                Transition::CustomerResponse(CustomerResponseStatus::Rejected),
            ),
            (EstimateStatus::CustomerAccepted, Transition::ConvertToDeal),
            (EstimateStatus::FinalCreated, Transition::Cancel),
        ];
        for (from, transition) in pairs {
            let target = transition.target().unwrap();
            assert!(from.can_advance_to(target), "{} -> {}", from, target);
        }
    }

    #[test]
    fn plan_pairs_the_guard_with_a_matching_change() {
        let e = estimate(ObjectId::new());
        let admin = actor(Role::Admin);
        let cancel = EstimateChange::Cancel {
            by: admin.id,
            at: Utc::now(),
            reason: None,
        };
        let (guard, change) = plan(&e, Transition::Cancel, &admin, cancel).unwrap();
        assert_eq!(guard, EstimateGuard::status(EstimateStatus::Pending));
        assert_eq!(change.name(), "cancel");

        let mismatched = plan(&e, Transition::Cancel, &admin, EstimateChange::ApproveFinalQuotation);
        assert!(matches!(mismatched, Err(ServiceError::InternalError(_))));
    }
}
