use std::net::SocketAddr;

use reelmatch_core::Environment;

use super::*;
use crate::fetch::{FailureReason, FetchOutcome};
use crate::request::AccountRequest;
use crate::source::FixturePostSource;
use crate::test_support::{post, transient, ScriptedSource, Step};

fn fast_options() -> PipelineOptions {
    PipelineOptions {
        worker_budget: 4,
        retry: RetryPolicy {
            max_retries: 2,
            backoff_base: Duration::ZERO,
            max_backoff: Duration::ZERO,
            attempt_timeout: Some(Duration::from_secs(5)),
        },
        default_max_posts: 10,
        deadline: None,
    }
}

fn account(name: &str, links: &[&str], max_posts: Option<i64>) -> AccountRequest {
    AccountRequest {
        account: name.to_owned(),
        target_links: links.iter().map(|s| (*s).to_owned()).collect(),
        max_posts,
    }
}

fn bulk(accounts: Vec<AccountRequest>) -> BulkMatchRequest {
    BulkMatchRequest { accounts }
}

#[tokio::test]
async fn nasa_scenario_matches_single_reel() {
    let source = FixturePostSource::new().with_posts("nasa", vec![post("nasa", "ABC123", 100)]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![account(
        "nasa",
        &["https://instagram.com/reel/ABC123/"],
        Some(5),
    )]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let nasa = report.account("nasa").unwrap();
    assert_eq!(nasa.matched_posts_count, 1);
    assert_eq!(nasa.matched_posts[0].matched_post_data.metadata.likes, 100);
    assert_eq!(
        nasa.matched_posts[0].target_link,
        "https://instagram.com/reel/ABC123/"
    );
}

#[tokio::test]
async fn empty_source_yields_zero_matches_and_empty_outcome() {
    let source = FixturePostSource::new().with_posts("nasa", Vec::new());
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![account("nasa", &["reel/ABC123"], None)]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let nasa = report.account("nasa").unwrap();
    assert_eq!(nasa.total_reels_scraped, 0);
    assert_eq!(nasa.matched_posts_count, 0);
    assert_eq!(nasa.fetch_outcome, FetchOutcome::Empty);
    assert_eq!(report.summary.accounts_empty, 1);
}

#[tokio::test]
async fn zero_accounts_fails_validation_before_fetching() {
    let source = Arc::new(ScriptedSource::new(1));
    let pipeline = MatchPipeline::new(source.clone(), fast_options());

    let err = pipeline
        .run(&BulkMatchRequest::default(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::NoAccounts)
    ));
    assert_eq!(source.peak_concurrency(), 0);
}

#[tokio::test]
async fn failed_account_does_not_affect_others() {
    let source = ScriptedSource::new(4)
        .script("down", vec![Step::Fail(transient("down"))])
        .script("up", vec![Step::Posts(vec![post("up", "UP1", 3)])]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![
        account("down", &["reel/D1"], None),
        account("up", &["reel/UP1"], None),
    ]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.account("down").unwrap().fetch_outcome.is_failed());
    assert_eq!(report.account("down").unwrap().attempts, 3);
    assert_eq!(report.account("up").unwrap().matched_posts_count, 1);
    assert_eq!(report.summary.accounts_failed, 1);
    assert_eq!(report.summary.total_matched, 1);
}

#[tokio::test]
async fn shortcode_posted_by_another_account_is_not_matched() {
    let source = FixturePostSource::new()
        .with_posts("a", vec![post("a", "SHARED", 1)])
        .with_posts("b", vec![post("b", "OWN", 1)]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![
        account("a", &["reel/OWN"], None),
        account("b", &["reel/SHARED"], None),
    ]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.summary.total_matched, 0);
}

#[tokio::test]
async fn foreign_post_returned_under_account_is_not_matched() {
    let source = FixturePostSource::new().with_posts("b", vec![post("a", "SHARED", 1)]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![account("b", &["reel/SHARED"], None)]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    let b = report.account("b").unwrap();
    assert_eq!(b.matched_posts_count, 0);
    assert_eq!(b.not_found_targets, ["reel/SHARED"]);
    assert!(b.matched_posts.iter().all(|m| m.account == "b"));
}

#[tokio::test]
async fn duplicate_links_produce_one_match() {
    let source = FixturePostSource::new().with_posts("nasa", vec![post("nasa", "ABC123", 100)]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![account(
        "nasa",
        &[
            "https://www.instagram.com/reel/ABC123/",
            "https://instagram.com/p/ABC123",
        ],
        None,
    )]);

    let report = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    let nasa = report.account("nasa").unwrap();
    assert_eq!(nasa.matched_posts_count, 1);
    assert_eq!(nasa.duplicate_targets.len(), 1);
}

#[tokio::test]
async fn identical_runs_produce_identical_reports() {
    let source = FixturePostSource::new()
        .with_posts("a", vec![post("a", "A1", 1), post("a", "A2", 2)])
        .with_posts("b", vec![post("b", "B1", 3)]);
    let pipeline = MatchPipeline::new(Arc::new(source), fast_options());
    let request = bulk(vec![
        account("a", &["reel/A2", "reel/A1", "junk"], None),
        account("b", &["p/B1"], None),
        account("ghost", &["reel/G1"], None),
    ]);

    let first = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    let second = pipeline
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.summary.accounts_not_found, 1);
}

#[tokio::test]
async fn deadline_cancels_slow_accounts_and_keeps_finished_ones() {
    let source = ScriptedSource::new(4)
        .script("fast", vec![Step::Posts(vec![post("fast", "F1", 0)])])
        .script("stuck", vec![Step::Hang]);
    let options = PipelineOptions {
        deadline: Some(Duration::from_millis(100)),
        retry: RetryPolicy {
            attempt_timeout: None,
            ..fast_options().retry
        },
        ..fast_options()
    };
    let pipeline = MatchPipeline::new(Arc::new(source), options);
    let request = bulk(vec![
        account("fast", &["reel/F1"], None),
        account("stuck", &["reel/S1"], None),
    ]);

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(&request, &CancellationToken::new()),
    )
    .await
    .expect("deadline must end the run")
    .unwrap();

    assert_eq!(report.account("fast").unwrap().matched_posts_count, 1);
    assert_eq!(
        report.account("stuck").unwrap().fetch_outcome,
        FetchOutcome::Failed(FailureReason::Cancelled)
    );
}

#[tokio::test]
async fn external_cancellation_before_start_skips_all_fetches() {
    let source = Arc::new(ScriptedSource::new(4).script("nasa", vec![Step::Posts(Vec::new())]));
    let pipeline = MatchPipeline::new(source.clone(), fast_options());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = pipeline
        .run(&bulk(vec![account("nasa", &["reel/A"], None)]), &cancel)
        .await
        .unwrap();
    assert_eq!(
        report.account("nasa").unwrap().fetch_outcome,
        FetchOutcome::Failed(FailureReason::Cancelled)
    );
    assert_eq!(source.calls("nasa"), 0);
}

#[test]
fn options_follow_app_config() {
    let config = AppConfig {
        env: Environment::Test,
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        log_level: "debug".to_owned(),
        apify_token: None,
        apify_base_url: "http://localhost".to_owned(),
        scraper_timeout_secs: 30,
        scraper_user_agent: "test".to_owned(),
        fetch_timeout_secs: 0,
        max_workers: 7,
        max_retries: 4,
        retry_backoff_base_ms: 250,
        default_max_posts: 12,
        pipeline_deadline_secs: 0,
    };
    let options = PipelineOptions::from_config(&config);
    assert_eq!(options.worker_budget, 7);
    assert_eq!(options.retry.max_retries, 4);
    assert_eq!(options.retry.backoff_base, Duration::from_millis(250));
    assert_eq!(options.retry.attempt_timeout, None);
    assert_eq!(options.default_max_posts, 12);
    assert_eq!(options.deadline, None);
}
