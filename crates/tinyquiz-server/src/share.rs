//! Share links for a quiz.

use serde::Serialize;

use tinyquiz_common::QuizId;

const QR_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Where a quiz can be reached
#[derive(Debug, Clone)]
pub struct QuizLinks {
    /// Frontend page respondents open
    pub quiz_url: String,
    /// Direct API resource
    pub api_url: String,
}

impl QuizLinks {
    pub fn new(frontend_base: &str, api_base: &str, id: &QuizId) -> Self {
        Self {
            quiz_url: format!("{}/quiz/{}", frontend_base.trim_end_matches('/'), id),
            api_url: format!("{}/api/quiz/{}", api_base.trim_end_matches('/'), id),
        }
    }

    /// QR code image URL encoding the quiz page, `size` pixels square
    pub fn qr_code(&self, size: u32) -> String {
        format!(
            "{QR_ENDPOINT}?size={size}x{size}&data={}",
            urlencoding::encode(&self.quiz_url)
        )
    }

    pub fn whatsapp(&self, topic: &str) -> String {
        let text = format!("Take this quiz: {topic}\n{}", self.quiz_url);
        format!("https://wa.me/?text={}", urlencoding::encode(&text))
    }

    pub fn email(&self, topic: &str, question_count: usize) -> String {
        let subject = format!("Quiz: {topic}");
        let body = format!(
            "You're invited to take a quiz!\n\nTopic: {topic}\nQuestions: {question_count}\nTime limit: 30 minutes\n\nClick here to start: {}",
            self.quiz_url
        );
        format!(
            "mailto:?subject={}&body={}",
            urlencoding::encode(&subject),
            urlencoding::encode(&body)
        )
    }

    pub fn share_text(&self, topic: &str, question_count: usize, minutes_remaining: i64) -> String {
        format!(
            "🎯 Quiz: {topic}\n📝 {question_count} questions\n⏰ {minutes_remaining} minutes remaining\n\n🔗 Take the quiz: {}",
            self.quiz_url
        )
    }
}

/// `sharing` block returned right after generation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSharing {
    pub quiz_url: String,
    pub api_url: String,
    pub qr_code: String,
    pub instructions: &'static str,
    pub expires_in: &'static str,
}

impl From<&QuizLinks> for GeneratedSharing {
    fn from(links: &QuizLinks) -> Self {
        Self {
            quiz_url: links.quiz_url.clone(),
            api_url: links.api_url.clone(),
            qr_code: links.qr_code(200),
            instructions: "Share this link with students to take the quiz",
            expires_in: "30 minutes",
        }
    }
}
