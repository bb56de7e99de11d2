use super::sendmail::{MailError, Mailer};

const CONFIRMATION_CODE_TEMPLATE: &str = include_str!("templates/confirmation-code.txt");

fn render(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in placeholders {
        rendered = rendered.replace(key, value);
    }
    rendered
}

pub async fn send_confirmation_code(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    confirmation_code: &str,
    valid_for_seconds: i64,
) -> Result<(), MailError> {
    let subject = "Your confirmation code";
    let body = render(
        CONFIRMATION_CODE_TEMPLATE,
        &[
            ("{{username}}", username.to_string()),
            ("{{confirmation_code}}", confirmation_code.to_string()),
            ("{{hours}}", (valid_for_seconds / 3600).max(1).to_string()),
        ],
    );

    mailer.send(to_email, subject, body).await
}

/// Pull the code back out of a rendered confirmation mail.
pub fn extract_confirmation_code(body: &str) -> Option<&str> {
    body.lines()
        .find_map(|line| line.strip_prefix("Your confirmation code: "))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirmation_mail_contains_the_code() {
        let mailer = Mailer::memory("noreply@example.com").unwrap();
        send_confirmation_code(&mailer, "bob@example.com", "bob", "abc123", 86_400)
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "bob@example.com");
        assert!(sent[0].body.starts_with("Hello, bob!"));
        assert!(sent[0].body.contains("expires in 24 hours"));
        assert_eq!(extract_confirmation_code(&sent[0].body), Some("abc123"));
    }
}
