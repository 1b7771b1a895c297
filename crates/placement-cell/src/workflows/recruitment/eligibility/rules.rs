use super::super::domain::Qualifications;
use super::criteria::SelectionCriteria;
use super::IneligibilityReason;

/// Every criterion the record fails, in a fixed order so notices read consistently.
pub(crate) fn unmet_criteria(
    qualifications: &Qualifications,
    current_year: u8,
    criteria: &SelectionCriteria,
) -> Vec<IneligibilityReason> {
    let mut reasons = Vec::new();

    if let Some(required) = criteria.min_tenth_percentage {
        if qualifications.tenth_percentage < required {
            reasons.push(IneligibilityReason::TenthBelowMinimum {
                required,
                actual: qualifications.tenth_percentage,
            });
        }
    }

    if let Some(required) = criteria.min_twelfth_percentage {
        if qualifications.twelfth_percentage < required {
            reasons.push(IneligibilityReason::TwelfthBelowMinimum {
                required,
                actual: qualifications.twelfth_percentage,
            });
        }
    }

    if let Some(required) = criteria.min_graduation_percentage {
        let below = qualifications
            .graduation_percentage
            .map(|actual| actual < required)
            .unwrap_or(true);
        if below {
            reasons.push(IneligibilityReason::GraduationBelowMinimum {
                required,
                actual: qualifications.graduation_percentage,
            });
        }
    }

    if let Some(allowed) = criteria.max_active_backlogs {
        if qualifications.active_backlogs > allowed {
            reasons.push(IneligibilityReason::TooManyBacklogs {
                allowed,
                actual: qualifications.active_backlogs,
            });
        }
    }

    if !criteria.eligible_years.is_empty() && !criteria.eligible_years.contains(&current_year) {
        reasons.push(IneligibilityReason::YearNotEligible { year: current_year });
    }

    reasons
}
