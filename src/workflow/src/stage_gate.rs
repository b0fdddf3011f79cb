//! Stage-gated contract drafting
//!
//! Five fixed drafting stages; each stage unlocks only after the
//! previous one validates. Navigation is gated on accessibility, and
//! going back is always allowed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The fixed drafting stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStage {
    TemplateSelection,
    BasicInfo,
    ContentDraft,
    MilestonesTasks,
    ReviewPreview,
}

impl DraftStage {
    pub const ALL: [DraftStage; 5] = [
        DraftStage::TemplateSelection,
        DraftStage::BasicInfo,
        DraftStage::ContentDraft,
        DraftStage::MilestonesTasks,
        DraftStage::ReviewPreview,
    ];

    /// Position in the stage sequence
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&s| s == self).unwrap_or(0)
    }

    pub fn next(self) -> Option<DraftStage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<DraftStage> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for DraftStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DraftStage::TemplateSelection => "template_selection",
            DraftStage::BasicInfo => "basic_info",
            DraftStage::ContentDraft => "content_draft",
            DraftStage::MilestonesTasks => "milestones_tasks",
            DraftStage::ReviewPreview => "review_preview",
        };
        write!(f, "{s}")
    }
}

/// Validation state of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not yet reachable; the previous stage has not validated
    Locked,
    /// Reachable but not (or no longer) valid
    Incomplete,
    /// Passed validation
    Valid,
}

/// Per-stage validation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageValidation {
    pub stage: DraftStage,
    pub status: StageStatus,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub is_accessible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageValidation {
    fn locked(stage: DraftStage) -> Self {
        Self {
            stage,
            status: StageStatus::Locked,
            errors: Vec::new(),
            warnings: Vec::new(),
            is_accessible: false,
            completed_at: None,
        }
    }
}

/// One milestone within the drafted contract
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    pub due_date: Option<NaiveDate>,
    pub assignee: Option<String>,
}

/// The contract being drafted, as far as stage validation cares
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DraftContract {
    pub template_id: Option<String>,
    pub title: String,
    pub counterparty: String,
    pub department: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// No end date required when open-ended
    #[serde(default)]
    pub open_ended: bool,
    pub body: String,
    pub milestones: Vec<Milestone>,
    /// Drafter confirmed the final preview
    #[serde(default)]
    pub reviewed: bool,
}

/// Outcome of validating one stage against a draft
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

/// Per-stage validation rules, pluggable per deployment
pub trait StageValidator: Send + Sync {
    fn validate(&self, stage: DraftStage, draft: &DraftContract) -> ValidationReport;
}

/// Built-in validation rules
#[derive(Default)]
pub struct DefaultStageValidator;

impl StageValidator for DefaultStageValidator {
    fn validate(&self, stage: DraftStage, draft: &DraftContract) -> ValidationReport {
        let mut report = ValidationReport::default();
        match stage {
            DraftStage::TemplateSelection => {
                if draft.template_id.is_none() {
                    report.error("a template must be selected");
                }
            }
            DraftStage::BasicInfo => {
                if draft.title.trim().is_empty() {
                    report.error("title is required");
                }
                if draft.counterparty.trim().is_empty() {
                    report.error("counterparty is required");
                }
                if draft.department.trim().is_empty() {
                    report.error("department is required");
                }
                match (draft.start_date, draft.end_date) {
                    (None, _) => report.error("start date is required"),
                    (Some(start), Some(end)) if end <= start => {
                        report.error("end date must be after start date");
                    }
                    (Some(_), None) if !draft.open_ended => {
                        report.error("end date is required unless the contract is open-ended");
                    }
                    _ => {}
                }
            }
            DraftStage::ContentDraft => {
                if draft.body.trim().is_empty() {
                    report.error("contract body must not be empty");
                } else if draft.body.trim().len() < 100 {
                    report.warning("contract body is unusually short");
                }
            }
            DraftStage::MilestonesTasks => {
                if draft.milestones.is_empty() {
                    report.error("at least one milestone is required");
                }
                for (i, milestone) in draft.milestones.iter().enumerate() {
                    if milestone.name.trim().is_empty() {
                        report.error(format!("milestone {} has no name", i + 1));
                    }
                    if milestone.assignee.is_none() {
                        report.error(format!("milestone {} has no assignee", i + 1));
                    }
                    match milestone.due_date {
                        None => report.error(format!("milestone {} has no due date", i + 1)),
                        Some(due) => {
                            if let Some(start) = draft.start_date {
                                if due < start {
                                    report.error(format!(
                                        "milestone {} is due before the contract starts",
                                        i + 1
                                    ));
                                }
                            }
                            if let Some(end) = draft.end_date {
                                if due > end {
                                    report.error(format!(
                                        "milestone {} is due after the contract ends",
                                        i + 1
                                    ));
                                }
                            }
                        }
                    }
                }
            }
            DraftStage::ReviewPreview => {
                if !draft.reviewed {
                    report.error("the final preview must be confirmed");
                }
            }
        }
        report
    }
}

/// Tracks stage state for one draft and gates navigation between stages
pub struct StageGateController<V = DefaultStageValidator> {
    current: DraftStage,
    validations: Vec<StageValidation>,
    validator: V,
}

impl StageGateController<DefaultStageValidator> {
    pub fn new() -> Self {
        Self::with_validator(DefaultStageValidator)
    }
}

impl Default for StageGateController<DefaultStageValidator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: StageValidator> StageGateController<V> {
    pub fn with_validator(validator: V) -> Self {
        let mut validations: Vec<StageValidation> =
            DraftStage::ALL.iter().map(|&s| StageValidation::locked(s)).collect();
        // The first stage starts reachable
        validations[0].status = StageStatus::Incomplete;
        validations[0].is_accessible = true;

        Self {
            current: DraftStage::TemplateSelection,
            validations,
            validator,
        }
    }

    pub fn current_stage(&self) -> DraftStage {
        self.current
    }

    pub fn stage_validation(&self, stage: DraftStage) -> &StageValidation {
        &self.validations[stage.index()]
    }

    pub fn validations(&self) -> &[StageValidation] {
        &self.validations
    }

    /// Whether navigation to a stage is allowed. The first stage is
    /// always reachable; every other stage must have been unlocked.
    pub fn can_navigate_to(&self, stage: DraftStage) -> bool {
        stage == DraftStage::TemplateSelection || self.stage_validation(stage).is_accessible
    }

    /// Move to a stage if it is reachable. Blocked navigation is a
    /// no-op, reported by the return value.
    pub fn navigate_to(&mut self, stage: DraftStage) -> bool {
        if !self.can_navigate_to(stage) {
            debug!(stage = %stage, "navigation blocked, stage locked");
            return false;
        }
        self.current = stage;
        true
    }

    /// Validate the current stage against the draft. A passing
    /// validation stamps the stage complete and unlocks the next one;
    /// a failing one records errors and leaves the gate closed.
    pub fn validate_current_stage(&mut self, draft: &DraftContract) -> bool {
        let stage = self.current;
        let report = self.validator.validate(stage, draft);
        let valid = report.is_valid();

        let record = &mut self.validations[stage.index()];
        record.errors = report.errors;
        record.warnings = report.warnings;
        if valid {
            record.status = StageStatus::Valid;
            record.completed_at = Some(Utc::now());
            if let Some(next) = stage.next() {
                let next_record = &mut self.validations[next.index()];
                next_record.is_accessible = true;
                if next_record.status == StageStatus::Locked {
                    next_record.status = StageStatus::Incomplete;
                }
            }
        } else {
            record.status = StageStatus::Incomplete;
            record.completed_at = None;
        }

        debug!(stage = %stage, valid, "stage validated");
        valid
    }

    /// Advance to the next stage; requires the current stage to be
    /// valid. At the last stage this returns `false`.
    pub fn next_stage(&mut self) -> bool {
        if self.stage_validation(self.current).status != StageStatus::Valid {
            return false;
        }
        match self.current.next() {
            Some(next) => self.navigate_to(next),
            None => false,
        }
    }

    /// Go back one stage; always allowed except at the first stage
    pub fn previous_stage(&mut self) -> bool {
        match self.current.previous() {
            Some(prev) => {
                self.current = prev;
                true
            }
            None => false,
        }
    }

    /// All five stages validated
    pub fn is_complete(&self) -> bool {
        self.validations
            .iter()
            .all(|v| v.status == StageStatus::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> DraftContract {
        DraftContract {
            template_id: Some("tpl-standard".to_string()),
            title: "Consulting Agreement".to_string(),
            counterparty: "Acme GmbH".to_string(),
            department: "engineering".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 1),
            end_date: NaiveDate::from_ymd_opt(2027, 8, 31),
            open_ended: false,
            body: "Lorem ipsum ".repeat(20),
            milestones: vec![Milestone {
                name: "Kickoff".to_string(),
                due_date: NaiveDate::from_ymd_opt(2026, 9, 15),
                assignee: Some("user:pm".to_string()),
            }],
            reviewed: true,
        }
    }

    #[test]
    fn test_initial_state() {
        let controller = StageGateController::new();
        assert_eq!(controller.current_stage(), DraftStage::TemplateSelection);

        let first = controller.stage_validation(DraftStage::TemplateSelection);
        assert_eq!(first.status, StageStatus::Incomplete);
        assert!(first.is_accessible);

        for stage in &DraftStage::ALL[1..] {
            let v = controller.stage_validation(*stage);
            assert_eq!(v.status, StageStatus::Locked);
            assert!(!v.is_accessible);
        }
    }

    #[test]
    fn test_navigation_blocked_until_validated() {
        let mut controller = StageGateController::new();
        assert!(!controller.can_navigate_to(DraftStage::BasicInfo));
        assert!(!controller.navigate_to(DraftStage::BasicInfo));
        assert_eq!(controller.current_stage(), DraftStage::TemplateSelection);

        assert!(controller.validate_current_stage(&valid_draft()));
        assert!(controller.can_navigate_to(DraftStage::BasicInfo));
        assert!(controller.navigate_to(DraftStage::BasicInfo));
        assert_eq!(controller.current_stage(), DraftStage::BasicInfo);
    }

    #[test]
    fn test_validation_failure_records_errors() {
        let mut controller = StageGateController::new();
        let draft = DraftContract::default();

        assert!(!controller.validate_current_stage(&draft));
        let v = controller.stage_validation(DraftStage::TemplateSelection);
        assert_eq!(v.status, StageStatus::Incomplete);
        assert!(!v.errors.is_empty());
        assert!(v.completed_at.is_none());
        assert!(!controller.can_navigate_to(DraftStage::BasicInfo));
    }

    #[test]
    fn test_full_walkthrough() {
        let mut controller = StageGateController::new();
        let draft = valid_draft();

        for _ in 0..4 {
            assert!(controller.validate_current_stage(&draft));
            assert!(controller.next_stage());
        }
        assert_eq!(controller.current_stage(), DraftStage::ReviewPreview);
        assert!(controller.validate_current_stage(&draft));
        assert!(controller.is_complete());

        // No stage after the last
        assert!(!controller.next_stage());
    }

    #[test]
    fn test_previous_stage_always_allowed() {
        let mut controller = StageGateController::new();
        assert!(!controller.previous_stage());

        controller.validate_current_stage(&valid_draft());
        controller.next_stage();
        assert!(controller.previous_stage());
        assert_eq!(controller.current_stage(), DraftStage::TemplateSelection);
    }

    #[test]
    fn test_next_stage_requires_valid_current() {
        let mut controller = StageGateController::new();
        assert!(!controller.next_stage());
        assert_eq!(controller.current_stage(), DraftStage::TemplateSelection);
    }

    #[test]
    fn test_basic_info_date_ordering() {
        let validator = DefaultStageValidator;
        let mut draft = valid_draft();
        draft.end_date = NaiveDate::from_ymd_opt(2026, 8, 1);

        let report = validator.validate(DraftStage::BasicInfo, &draft);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("end date must be after start date")));
    }

    #[test]
    fn test_open_ended_contract_needs_no_end_date() {
        let validator = DefaultStageValidator;
        let mut draft = valid_draft();
        draft.end_date = None;
        draft.open_ended = true;

        assert!(validator.validate(DraftStage::BasicInfo, &draft).is_valid());
    }

    #[test]
    fn test_milestone_rules() {
        let validator = DefaultStageValidator;
        let mut draft = valid_draft();

        draft.milestones.clear();
        assert!(!validator.validate(DraftStage::MilestonesTasks, &draft).is_valid());

        draft.milestones.push(Milestone {
            name: "Kickoff".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 8, 1),
            assignee: None,
        });
        let report = validator.validate(DraftStage::MilestonesTasks, &draft);
        assert!(report.errors.iter().any(|e| e.contains("no assignee")));
        assert!(report.errors.iter().any(|e| e.contains("due before")));
    }

    #[test]
    fn test_milestone_after_contract_end_is_rejected() {
        let validator = DefaultStageValidator;
        let mut draft = valid_draft();
        draft.milestones[0].due_date = NaiveDate::from_ymd_opt(2027, 12, 1);

        let report = validator.validate(DraftStage::MilestonesTasks, &draft);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.contains("due after")));
    }

    #[test]
    fn test_short_body_warns_but_passes() {
        let validator = DefaultStageValidator;
        let mut draft = valid_draft();
        draft.body = "short body".to_string();

        let report = validator.validate(DraftStage::ContentDraft, &draft);
        assert!(report.is_valid());
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn test_revalidation_after_going_back() {
        let mut controller = StageGateController::new();
        let draft = valid_draft();

        controller.validate_current_stage(&draft);
        controller.next_stage();
        controller.validate_current_stage(&draft);

        // Going back and failing validation relocks forward progress
        controller.previous_stage();
        let broken = DraftContract::default();
        assert!(!controller.validate_current_stage(&broken));
        assert!(!controller.next_stage());
        // Already-unlocked stages stay reachable
        assert!(controller.can_navigate_to(DraftStage::BasicInfo));
    }
}
