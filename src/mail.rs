pub mod mails;
pub mod sendmail;

pub use sendmail::{MailError, Mailer, SentMail};
