use crate::analyzer::Analyzer;
use crate::model::analysis_response::AnalysisServerResponse;
use crate::model::check::CheckOutcome;
use crate::model::verify_request::VerifyServerRequest;

/// Scans the tool descriptions of a verification request and reports the
/// issues found.
///
/// This never fails: a check that cannot be completed counts as a check that
/// found nothing.
#[tracing::instrument(skip_all)]
pub async fn process_analysis_request(
    request: VerifyServerRequest,
    analyzer: &Analyzer,
) -> AnalysisServerResponse {
    if !analyzer.is_enabled() {
        tracing::debug!("No classifier backend configured, skipping analysis");
        return AnalysisServerResponse::default();
    }

    tracing::debug!("Processing analysis request");
    let evaluations = analyzer.evaluate(&request).await;
    let issues = analyzer.issues(&evaluations);

    let unavailable = evaluations
        .iter()
        .filter(|e| e.outcome == CheckOutcome::Unavailable)
        .count();
    if unavailable > 0 {
        tracing::warn!(
            "{} of {} classification checks could not be completed",
            unavailable,
            evaluations.len()
        );
    }

    let tools_count = request.described_tools().count();
    let tools_str = if tools_count == 1 { "tool" } else { "tools" };
    tracing::info!(
        "Successfully completed analysis for {} {} ({} checks, {} issues)",
        tools_count,
        tools_str,
        evaluations.len(),
        issues.len()
    );

    AnalysisServerResponse { issues }
}
