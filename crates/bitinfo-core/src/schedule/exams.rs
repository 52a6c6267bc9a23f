use serde_json::json;
use tracing::debug;

use crate::api::{endpoints, ApiError, Realm, Request, Transport};
use crate::auth::Session;
use crate::models::ExamRecord;
use crate::scrape::portal::{datas_rows, ExamRow};

/// Newest exams first
const EXAM_ORDER: &str = "-KSRQ,-KSSJMS";

impl<T: Transport> Session<T> {
    /// Exam arrangements for a term. Defaults to the current term.
    pub async fn exams(&mut self, term: Option<&str>) -> Result<Vec<ExamRecord>, ApiError> {
        self.ensure_identity().await?;
        let term = self.term_or_current(term).await?;

        let param = json!({ "XNXQDM": term, "*order": EXAM_ORDER }).to_string();
        let response = self
            .fetch(
                Realm::Identity,
                Request::post(endpoints::exams_url()).form("requestParamStr", param),
            )
            .await?;
        let rows: Vec<ExamRow> = datas_rows(&response.body, "cxxsksap")?;
        debug!(%term, exams = rows.len(), "Exam rows received");

        rows.into_iter().map(ExamRow::into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeTransport;
    use crate::auth::session::tests::{identity_alive, session};

    #[tokio::test]
    async fn test_exams_default_to_current_term() {
        let fake = FakeTransport::new();
        identity_alive(&fake);
        fake.ok(
            Realm::Identity,
            &endpoints::current_term_url(),
            r#"{"datas":{"dqxnxq":{"rows":[{"DM":"2021-2022-1"}]}}}"#,
        );
        fake.ok(
            Realm::Identity,
            &endpoints::exams_url(),
            r#"{"datas":{"cxxsksap":{"rows":[{"KCM":"数据结构","ZJJSXM":"李四","KCH":"CS101","JASMC":"理教101","KSSJMS":"2022-01-10 08:00-10:00(星期一)","ZWH":"12"}]}}}"#,
        );
        let mut session = session(fake);

        let exams = session.exams(None).await.unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].name, "数据结构-李四-CS101");
        assert_eq!(exams[0].description, "Seat: 12");

        let (_, request) = session
            .transport
            .sent()
            .into_iter()
            .find(|(_, r)| r.url == endpoints::exams_url())
            .unwrap();
        let param: serde_json::Value = serde_json::from_str(&request.form[0].1).unwrap();
        assert_eq!(param["XNXQDM"], "2021-2022-1");
        assert_eq!(param["*order"], EXAM_ORDER);
    }

    #[tokio::test]
    async fn test_unparseable_exam_time_fails_the_call() {
        let fake = FakeTransport::new();
        identity_alive(&fake);
        fake.ok(
            Realm::Identity,
            &endpoints::exams_url(),
            r#"{"datas":{"cxxsksap":{"rows":[{"KCM":"体育","KCH":"PE1","KSSJMS":"待定"}]}}}"#,
        );
        let mut session = session(fake);

        let err = session.exams(Some("2021-2022-1")).await.unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { what: "exams", .. }));
    }
}
