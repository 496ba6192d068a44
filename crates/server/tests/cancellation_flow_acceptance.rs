use std::sync::Arc;

use client_core::{
    AbOverride, FieldEdit, FlowConfig, FlowController, FlowEvent, SessionCookies, StepKind,
    SubmissionClient, SubmissionConfig, WizardSession,
};
use rand::{rngs::StdRng, SeedableRng};
use server::{build_router, sink::SubmissionKind, AppState, InMemorySink, Settings};
use shared::domain::{AbVariant, CancellationReason, CountBin, InterviewBin, VisaSource};
use tokio::net::TcpListener;

async fn start_server() -> anyhow::Result<(String, Arc<InMemorySink>)> {
    let sink = Arc::new(InMemorySink::new());
    let state = AppState::new(&Settings::default(), sink.clone());
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), sink))
}

async fn wizard(base_url: &str, config: FlowConfig) -> anyhow::Result<WizardSession> {
    let cookies = SessionCookies::new();
    let client = SubmissionClient::new(SubmissionConfig::new(base_url)?, cookies.clone())?;
    client.prime().await?;
    let controller = FlowController::with_rng(config, cookies, StdRng::seed_from_u64(42));
    Ok(WizardSession::new(controller, Arc::new(client)))
}

async fn run(session: &mut WizardSession, events: Vec<FlowEvent>) -> anyhow::Result<()> {
    for event in events {
        session.dispatch(event).await?;
    }
    Ok(())
}

fn edit(field: FieldEdit) -> FlowEvent {
    FlowEvent::Edit(field)
}

#[tokio::test]
async fn declined_offer_walk_records_a_clamped_price() -> anyhow::Result<()> {
    let (base_url, sink) = start_server().await?;
    let mut session = wizard(
        &base_url,
        FlowConfig {
            plan_price_cents: 2500,
            ab_override: Some(AbOverride::Force(AbVariant::A)),
        },
    )
    .await?;

    run(&mut session, vec![FlowEvent::Open, FlowEvent::NotYet]).await?;
    let variant = session.state().ab_variant;
    assert_eq!(variant, Some(AbVariant::A));

    run(
        &mut session,
        vec![
            FlowEvent::DeclineOffer,
            edit(FieldEdit::AppliedViaPlatform("0".into())),
            edit(FieldEdit::EmailedCompanies("1-5".into())),
            edit(FieldEdit::InterviewedCompanies("3-5".into())),
            FlowEvent::Next,
            edit(FieldEdit::Reason("too_expensive".into())),
            edit(FieldEdit::MaxPrice("20".into())),
            FlowEvent::Next,
        ],
    )
    .await?;
    assert_eq!(session.step().kind(), StepKind::CancellationComplete);

    let records = sink.snapshot().await;
    assert_eq!(records.len(), 1);
    let SubmissionKind::Reason(request) = &records[0].kind else {
        panic!("expected a reason submission");
    };
    assert_eq!(request.reason, CancellationReason::TooExpensive);
    assert_eq!(request.max_price_cents, Some(2000));
    assert_eq!(request.details, None);
    let survey = request.offer_survey.as_ref().expect("survey travels with reason");
    assert_eq!(survey.applied_via_platform, Some(CountBin::Zero));
    assert_eq!(survey.emailed_companies, Some(CountBin::OneToFive));
    assert_eq!(survey.interviewed_companies, Some(InterviewBin::ThreeToFive));
    Ok(())
}

#[tokio::test]
async fn found_job_walk_records_visa_support() -> anyhow::Result<()> {
    let (base_url, sink) = start_server().await?;
    let mut session = wizard(&base_url, FlowConfig::default()).await?;

    run(
        &mut session,
        vec![
            FlowEvent::Open,
            FlowEvent::FoundJob,
            edit(FieldEdit::FoundViaPlatform("yes".into())),
            edit(FieldEdit::AppliedViaPlatform("6-20".into())),
            edit(FieldEdit::EmailedCompanies("1-5".into())),
            edit(FieldEdit::InterviewedCompanies("3-5".into())),
            FlowEvent::Next,
            edit(FieldEdit::Feedback("a".repeat(24))),
        ],
    )
    .await?;
    assert_eq!(session.step().kind(), StepKind::Feedback);
    assert!(!session.step().primary_enabled());
    assert!(session.dispatch(FlowEvent::Next).await.is_err());

    run(&mut session, vec![edit(FieldEdit::Feedback("a".repeat(25)))]).await?;
    assert!(session.step().primary_enabled());

    run(
        &mut session,
        vec![
            FlowEvent::Next,
            edit(FieldEdit::HasCompanyLawyer(true)),
            edit(FieldEdit::VisaType("h1b".into())),
            FlowEvent::Next,
        ],
    )
    .await?;
    assert_eq!(session.step().kind(), StepKind::CancellationComplete);
    assert!(session.state().visa_support.is_none());

    let records = sink.snapshot().await;
    assert_eq!(records.len(), 1);
    let SubmissionKind::Visa(request) = &records[0].kind else {
        panic!("expected a visa submission");
    };
    assert_eq!(request.visa_type, "H1B");
    assert_eq!(request.source, VisaSource::WithPlatform);
    assert!(request.has_company_lawyer);
    let usage = request.offer_usage.as_ref().expect("usage bins");
    assert_eq!(usage.applied_via_platform, Some(CountBin::SixToTwenty));
    Ok(())
}

#[tokio::test]
async fn forged_token_never_reaches_the_sink() -> anyhow::Result<()> {
    let (base_url, sink) = start_server().await?;
    let mut session = wizard(&base_url, FlowConfig::default()).await?;
    session
        .controller()
        .cookies()
        .set_meta_csrf(Some("forged".into()));

    run(
        &mut session,
        vec![
            FlowEvent::Open,
            FlowEvent::NotYet,
            FlowEvent::DeclineOffer,
            edit(FieldEdit::AppliedViaPlatform("0".into())),
            edit(FieldEdit::EmailedCompanies("0".into())),
            edit(FieldEdit::InterviewedCompanies("0".into())),
            FlowEvent::Next,
            edit(FieldEdit::Reason("other".into())),
            edit(FieldEdit::Details(
                "Moving back home and no longer need the service.".into(),
            )),
            FlowEvent::Next,
        ],
    )
    .await?;

    assert_eq!(session.step().kind(), StepKind::CancelReasonSelection);
    let status = session.step().status().expect("status");
    assert!(status.error.is_some());
    assert!(sink.snapshot().await.is_empty());
    Ok(())
}
