use chrono::NaiveDate;
use serde::Serialize;

use super::codec::SessionTokens;
use super::domain::{PlacementType, SessionKind, SessionRef, StudentId};
use super::query::SessionAttributes;
use super::repository::{DummyListing, PlacementListing};

/// Result of asking for a student's opportunities board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ListingOutcome {
    /// The student has not stated a salary expectation yet.
    PaygradeRequired,
    Barred,
    Opportunities(OpportunityBoard),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpportunityBoard {
    pub jobs: OpportunityPartition,
    pub internships: OpportunityPartition,
}

impl OpportunityBoard {
    pub fn category(&self, kind: PlacementType) -> &OpportunityPartition {
        match kind {
            PlacementType::Job => &self.jobs,
            PlacementType::Internship => &self.internships,
        }
    }

    fn category_mut(&mut self, kind: PlacementType) -> &mut OpportunityPartition {
        match kind {
            PlacementType::Job => &mut self.jobs,
            PlacementType::Internship => &mut self.internships,
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len() + self.internships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpportunityPartition {
    pub enrolled: Vec<Opportunity>,
    pub unenrolled: Vec<Opportunity>,
}

impl OpportunityPartition {
    pub fn len(&self) -> usize {
        self.enrolled.len() + self.unenrolled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sort(&mut self) {
        self.enrolled.sort_by_key(|item| item.last_day);
        self.unenrolled.sort_by_key(|item| item.last_day);
    }
}

/// One listed session. Raw ids stay server-side; clients only see the token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub token: String,
    pub origin: SessionKind,
    #[serde(skip)]
    pub session: SessionRef,
    pub company_name: String,
    pub placement_type: PlacementType,
    pub salary: u32,
    pub application_deadline: NaiveDate,
    /// Deadline plus one day: applications close at the start of this date.
    pub last_day: NaiveDate,
    pub ended: bool,
}

fn opportunity<S>(session: &S, company_name: &str, tokens: &SessionTokens) -> Opportunity
where
    S: SessionAttributes,
{
    let reference = session.session_ref();
    let deadline = session.application_deadline();
    Opportunity {
        token: tokens.encode(reference),
        origin: reference.kind(),
        session: reference,
        company_name: company_name.to_string(),
        placement_type: session.placement_type(),
        salary: session.salary(),
        application_deadline: deadline,
        last_day: deadline.succ_opt().unwrap_or(deadline),
        ended: session.ended(),
    }
}

/// Split already-filtered sessions into the job/internship boards.
///
/// Real sessions are pushed ahead of practice ones and the sort is stable, so on equal last days
/// real sessions list first.
pub fn build_board(
    student: StudentId,
    placements: &[PlacementListing],
    dummies: &[DummyListing],
    tokens: &SessionTokens,
) -> OpportunityBoard {
    let mut board = OpportunityBoard::default();

    let real = placements.iter().map(|listing| {
        (
            listing.has_enrolled(student),
            opportunity(listing, &listing.company.name, tokens),
        )
    });
    let practice = dummies.iter().map(|listing| {
        (
            listing.has_enrolled(student),
            opportunity(listing, &listing.company.name, tokens),
        )
    });

    for (enrolled, item) in real.chain(practice) {
        let partition = board.category_mut(item.placement_type);
        if enrolled {
            partition.enrolled.push(item);
        } else {
            partition.unenrolled.push(item);
        }
    }

    board.jobs.sort();
    board.internships.sort();
    board
}
