use super::common::*;

use crate::workflows::profiles::{EnrollmentNumberError, ProfileError, QualificationsForm};
use crate::workflows::recruitment::domain::{
    DummyCompany, DummyCompanyId, DummySession, DummySessionId, FacultyId, PlacementType,
    SessionRef, StreamId, StudentId, Verification,
};
use crate::workflows::recruitment::eligibility::{
    evaluate, MissingPrerequisite, SelectionCriteria, Verdict,
};
use crate::workflows::recruitment::repository::{CatalogStore, PlacementStore};

#[test]
fn signup_derives_college_and_stream_from_the_enrollment_number() {
    let (service, _) = build_service();

    let student = service
        .create_profile("00216403120", details())
        .expect("signup");

    assert_eq!(student.college, HOME);
    assert_eq!(student.stream, StreamId(2));
    assert_eq!(student.enrollment_no, "00216403120");
    assert_eq!(student.verification, Verification::unverified());
    assert!(student.qualifications.is_none());
    assert!(student.salary_expected.is_none());
}

#[test]
fn signup_rejects_unknown_codes_and_unoffered_streams() {
    let (service, _) = build_service();

    let unknown_college = service.create_profile("00199902720", details());
    assert!(matches!(
        unknown_college,
        Err(ProfileError::UnknownCollege(ref code)) if code == "999"
    ));
    assert_eq!(
        unknown_college.expect_err("unknown").to_string(),
        "Institution with code 999 does not exist"
    );

    assert!(matches!(
        service.create_profile("00116499920", details()),
        Err(ProfileError::UnknownStream)
    ));
    assert!(matches!(
        service.create_profile("00115003120", details()),
        Err(ProfileError::StreamNotOffered { .. })
    ));
    assert!(matches!(
        service.create_profile("0011640272", details()),
        Err(ProfileError::InvalidEnrollment(EnrollmentNumberError::Length { .. }))
    ));
}

#[test]
fn signup_rejects_duplicates_and_impossible_years() {
    let (service, _) = build_service();
    signed_up(&service);

    assert!(matches!(
        service.create_profile(ENROLLMENT, details()),
        Err(ProfileError::AlreadyRegistered)
    ));

    let mut fifth_year = details();
    fifth_year.current_year = 5;
    assert!(matches!(
        service.create_profile("00316402720", fifth_year),
        Err(ProfileError::InvalidYear { year: 5, years: 4 })
    ));
}

#[test]
fn student_edits_send_the_profile_back_for_verification() {
    let (service, store) = build_service();
    let student = signed_up(&service);
    service
        .verify_profile(OFFICER, student, Some(true))
        .expect("verify");

    let mut edited = details();
    edited.last_name = "Verma-Rao".to_string();
    let record = service.edit_profile(student, edited).expect("edit");

    assert_eq!(record.last_name, "Verma-Rao");
    assert_eq!(record.verification.verdict, Some(false));
    assert_eq!(record.verification.verified_by, Some(OFFICER));
    let stored = store.student(student).expect("lookup").expect("student");
    assert!(!stored.verification.is_verified());
}

#[test]
fn qualifications_follow_the_same_reset_rule() {
    let (service, _) = build_service();
    let student = signed_up(&service);
    service
        .verify_profile(OFFICER, student, Some(true))
        .expect("verify profile");

    let record = service.submit_qualifications(student, form()).expect("submit");
    let qualifications = record.qualifications.expect("qualifications");
    assert_eq!(qualifications.verification.verdict, Some(false));
    assert_eq!(qualifications.verification.verified_by, Some(OFFICER));

    service
        .verify_qualifications(CLERK, student, Some(true))
        .expect("verify qualifications");
    let mut revised = form();
    revised.active_backlogs = 1;
    let record = service.submit_qualifications(student, revised).expect("resubmit");
    let qualifications = record.qualifications.expect("qualifications");
    assert_eq!(qualifications.active_backlogs, 1);
    assert_eq!(qualifications.verification.verified_by, Some(CLERK));
    assert!(!qualifications.verification.is_verified());
}

#[test]
fn out_of_range_percentages_are_rejected() {
    let (service, _) = build_service();
    let student = signed_up(&service);

    let invalid = QualificationsForm {
        graduation_percentage: Some(101.0),
        ..form()
    };
    assert!(matches!(
        service.submit_qualifications(student, invalid),
        Err(ProfileError::InvalidPercentage {
            field: "graduation_percentage"
        })
    ));
}

#[test]
fn verification_unlocks_eligibility_end_to_end() {
    let (service, store) = build_service();
    let student = signed_up(&service);
    let criteria = SelectionCriteria::open();

    let record = store.student(student).expect("lookup").expect("student");
    assert_eq!(
        evaluate(&record, &criteria),
        Verdict::Indeterminate(MissingPrerequisite::QualificationsForm)
    );

    service.submit_qualifications(student, form()).expect("submit");
    service
        .verify_qualifications(OFFICER, student, Some(true))
        .expect("verify qualifications");
    let record = store.student(student).expect("lookup").expect("student");
    assert_eq!(
        evaluate(&record, &criteria),
        Verdict::Indeterminate(MissingPrerequisite::ProfileVerification)
    );

    let record = service
        .verify_profile(OFFICER, student, Some(true))
        .expect("verify profile");
    assert_eq!(evaluate(&record, &criteria), Verdict::Eligible);
}

#[test]
fn skipped_verification_is_recorded_as_undecided() {
    let (service, _) = build_service();
    let student = signed_up(&service);

    let record = service
        .verify_profile(CLERK, student, None)
        .expect("skip");
    assert_eq!(record.verification.verdict, None);
    assert_eq!(record.verification.verified_by, Some(CLERK));
    assert!(!record.verification.is_verified());
}

#[test]
fn faculty_act_only_within_their_college_and_permissions() {
    let (service, _) = build_service();
    let student = signed_up(&service);

    assert!(matches!(
        service.verify_profile(VISITOR, student, Some(true)),
        Err(ProfileError::CollegeMismatch)
    ));
    assert!(matches!(
        service.verify_profile(FacultyId(42), student, Some(true)),
        Err(ProfileError::UnknownFaculty)
    ));
    assert!(matches!(
        service.delete_student(CLERK, student, Some("duplicate account")),
        Err(ProfileError::PermissionDenied)
    ));
    assert!(matches!(
        service.verify_qualifications(OFFICER, student, Some(true)),
        Err(ProfileError::QualificationsMissing)
    ));
}

#[test]
fn barring_is_a_verifier_action() {
    let (service, store) = build_service();
    let student = signed_up(&service);

    let record = service.set_barred(CLERK, student, true).expect("bar");
    assert!(record.is_barred);
    assert!(store.student(student).expect("lookup").expect("student").is_barred);

    let record = service.set_barred(CLERK, student, false).expect("unbar");
    assert!(!record.is_barred);
}

#[test]
fn paygrade_must_be_positive() {
    let (service, _) = build_service();
    let student = signed_up(&service);

    assert!(matches!(
        service.set_paygrade(student, 0),
        Err(ProfileError::InvalidPaygrade)
    ));
    let record = service.set_paygrade(student, 7).expect("paygrade");
    assert_eq!(record.salary_expected, Some(7));
    assert!(matches!(
        service.set_paygrade(StudentId(99), 7),
        Err(ProfileError::UnknownStudent)
    ));
}

#[test]
fn deletion_removes_the_student_and_memberships() {
    let (service, store) = build_service();
    let student = signed_up(&service);
    let session = add_company_session(store.as_ref(), 1, "Acme Analytics");
    join(store.as_ref(), student, session);

    service
        .delete_student(OFFICER, student, None)
        .expect("delete");

    assert!(store.student(student).expect("lookup").is_none());
    let SessionRef::Placement(id) = session else {
        panic!("placement session expected");
    };
    let listing = store.placement_session(id).expect("lookup").expect("session");
    assert!(listing.session.students.is_empty());
    assert!(matches!(
        service.delete_student(OFFICER, student, None),
        Err(ProfileError::UnknownStudent)
    ));
}

#[test]
fn public_summary_names_three_companies_then_and_others() {
    let (service, store) = build_service();
    let student = signed_up(&service);
    let names = ["Acme Analytics", "Borealis Labs", "Cobalt Systems", "Delta Works"];
    for (index, name) in names.iter().enumerate() {
        let session = add_company_session(store.as_ref(), index as u64 + 1, name);
        join(store.as_ref(), student, session);
    }
    store
        .insert_dummy_company(DummyCompany {
            id: DummyCompanyId(1),
            name: "Practice Round".to_string(),
            college: HOME,
        })
        .expect("dummy company");
    store
        .insert_dummy_session(DummySession {
            id: DummySessionId(1),
            dummy_company: DummyCompanyId(1),
            placement_type: PlacementType::Job,
            salary: 3,
            streams: [StreamId(1)].into_iter().collect(),
            application_deadline: chrono::NaiveDate::from_ymd_opt(2099, 1, 1).expect("date"),
            selection_criteria: SelectionCriteria::open(),
            ended: false,
            students: Default::default(),
            applicants: Default::default(),
        })
        .expect("dummy session");
    join(store.as_ref(), student, SessionRef::Dummy(DummySessionId(1)));

    let profile = service.public_summary(student).expect("summary");

    assert_eq!(profile.name, "Asha Verma");
    assert_eq!(profile.stream, "Computer Science");
    assert_eq!(profile.placement_sessions, 4);
    assert_eq!(
        profile.company_line(),
        "Acme Analytics, Borealis Labs, Cobalt Systems and others"
    );
}

#[test]
fn public_summary_without_sessions_is_empty() {
    let (service, _) = build_service();
    let student = signed_up(&service);

    let profile = service.public_summary(student).expect("summary");
    assert_eq!(profile.placement_sessions, 0);
    assert!(profile.companies.is_empty());
    assert_eq!(profile.company_line(), "");
}
