use crate::infra::{parse_date, parse_session_kind, seed_demo_catalog, DEMO_FACULTY};
use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand};
use placement_cell::config::AppConfig;
use placement_cell::error::AppError;
use placement_cell::workflows::profiles::{
    ProfileDetails, ProfileError, ProfileService, QualificationsForm,
};
use placement_cell::workflows::recruitment::{
    EnrollmentError, EnrollmentService, InMemoryPlacementStore, ListingOutcome, OpportunityBoard,
    OpportunityPartition, RecordingDispatcher, SessionKind, SessionRef, SessionTokens,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the evaluation date (defaults to today).
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Expected salary in lakhs per annum for the demo student.
    #[arg(long, default_value_t = 8)]
    pub(crate) paygrade: u32,
    /// Leave the demo student unverified to show the prerequisite messages.
    #[arg(long)]
    pub(crate) skip_verification: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum TokenCommand {
    /// Print the URL token for a session id
    Encode(TokenEncodeArgs),
    /// Print the session id behind a URL token
    Decode(TokenDecodeArgs),
}

#[derive(Args, Debug)]
pub(crate) struct TokenEncodeArgs {
    /// Session kind: placement or dummy
    #[arg(long, value_parser = parse_session_kind, default_value = "placement")]
    pub(crate) kind: SessionKind,
    /// Numeric session id
    pub(crate) id: u64,
}

#[derive(Args, Debug)]
pub(crate) struct TokenDecodeArgs {
    /// Session kind: placement or dummy
    #[arg(long, value_parser = parse_session_kind, default_value = "placement")]
    pub(crate) kind: SessionKind,
    /// Token as it appears in the URL
    pub(crate) token: String,
}

pub(crate) fn run_token(command: TokenCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let tokens = SessionTokens::from_config(&config.identifiers)?;

    match command {
        TokenCommand::Encode(args) => {
            println!("{}", tokens.encode(SessionRef::from_parts(args.kind, args.id)));
        }
        TokenCommand::Decode(args) => {
            let session = tokens.decode(args.kind, &args.token)?;
            println!("{}", session.raw_id());
        }
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        paygrade,
        skip_verification,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryPlacementStore::new());
    seed_demo_catalog(store.as_ref(), today)?;
    let notifier = Arc::new(RecordingDispatcher::new());
    let enrollment = EnrollmentService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(SessionTokens::new("demo-placement", "demo-dummy", 8)?),
    );
    let profiles = ProfileService::new(store);

    println!("Placement cell demo (evaluated {today})");

    let student = match profiles.create_profile(
        "00116402720",
        ProfileDetails {
            first_name: "Asha".to_string(),
            last_name: "Verma".to_string(),
            email: "asha.verma@example.edu".to_string(),
            current_year: 3,
        },
    ) {
        Ok(student) => student,
        Err(err) => return demo_failure("signup", err),
    };
    println!(
        "Signed up {} ({}), awaiting verification",
        student.full_name(),
        student.enrollment_no
    );

    if let Ok(outcome) = enrollment.list_opportunities(student.id, today) {
        if outcome == ListingOutcome::PaygradeRequired {
            println!("Listing before paygrade: paygrade required");
        }
    }

    if let Err(err) = profiles.set_paygrade(student.id, paygrade) {
        return demo_failure("paygrade", err);
    }
    let form = QualificationsForm {
        tenth_percentage: 88.0,
        twelfth_percentage: 79.5,
        graduation_percentage: Some(72.0),
        active_backlogs: 0,
    };
    if let Err(err) = profiles.submit_qualifications(student.id, form) {
        return demo_failure("qualifications", err);
    }

    if !skip_verification {
        let verified = profiles
            .verify_qualifications(DEMO_FACULTY, student.id, Some(true))
            .and_then(|_| profiles.verify_profile(DEMO_FACULTY, student.id, Some(true)));
        if let Err(err) = verified {
            return demo_failure("verification", err);
        }
        println!("Profile and qualifications verified by the placement officer");
    }

    let board = match enrollment.list_opportunities(student.id, today) {
        Ok(ListingOutcome::Opportunities(board)) => board,
        Ok(other) => {
            println!("\nNo opportunities listed: {other:?}");
            return Ok(());
        }
        Err(err) => return enrollment_failure("listing", err),
    };
    render_board(&board);

    let Some(first) = board
        .jobs
        .unenrolled
        .first()
        .or_else(|| board.internships.unenrolled.first())
    else {
        println!("\nNothing to apply to within a {paygrade} LPA expectation");
        return Ok(());
    };

    println!("\nToggling {} twice", first.company_name);
    for _ in 0..2 {
        match enrollment.toggle_application(student.id, first.session, today) {
            Ok(outcome) => println!("- {outcome:?}"),
            Err(err) => println!("- rejected: {err}"),
        }
    }

    for target in board
        .jobs
        .unenrolled
        .iter()
        .chain(board.internships.unenrolled.iter())
        .skip(1)
    {
        match enrollment.evaluate(student.id, target.session) {
            Ok(verdict) => println!(
                "Eligibility for {}: {}",
                target.company_name,
                verdict.summary()
            ),
            Err(err) => println!("Eligibility for {}: {err}", target.company_name),
        }
    }

    match profiles.public_summary(student.id) {
        Ok(summary) => println!(
            "\nPublic profile: {}, {} ({} placement sessions)",
            summary.name, summary.stream, summary.placement_sessions
        ),
        Err(err) => return demo_failure("public profile", err),
    }

    let sent = notifier.sent();
    println!("\nNotifications queued: {}", sent.len());
    for notification in sent {
        println!("- {}", notification.message);
    }

    Ok(())
}

fn render_board(board: &OpportunityBoard) {
    println!("\nOpportunities ({} listed)", board.len());
    render_partition("Jobs", &board.jobs);
    render_partition("Internships", &board.internships);
}

fn render_partition(label: &str, partition: &OpportunityPartition) {
    println!("{label}");
    if partition.enrolled.is_empty() && partition.unenrolled.is_empty() {
        println!("- none");
        return;
    }
    for (status, items) in [("enrolled", &partition.enrolled), ("open", &partition.unenrolled)] {
        for item in items {
            println!(
                "- [{status}] {} ({}) {} LPA, last day {} | token {}",
                item.company_name,
                item.origin.label(),
                item.salary,
                item.last_day,
                item.token
            );
        }
    }
}

fn demo_failure(step: &str, err: ProfileError) -> Result<(), AppError> {
    println!("Demo stopped at {step}: {err}");
    match err {
        ProfileError::Store(store) => Err(store.into()),
        _ => Ok(()),
    }
}

fn enrollment_failure(step: &str, err: EnrollmentError) -> Result<(), AppError> {
    println!("Demo stopped at {step}: {err}");
    match err {
        EnrollmentError::Store(store) => Err(store.into()),
        _ => Ok(()),
    }
}
