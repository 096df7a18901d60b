//! Transactional email bodies. Every interpolated value is HTML-escaped.

use super::Email;
use crate::utils::string_utils::{escape_html, format_amount};

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:sans-serif\">\
         <h2>{}</h2>{}<p style=\"color:#888\">Care Marketplace</p></body></html>",
        escape_html(title),
        body
    )
}

pub fn welcome(to: &str, name: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Welcome to Care Marketplace".to_string(),
        html: layout(
            "Welcome",
            &format!(
                "<p>Hello {},</p><p>Your account is ready. Check your inbox for the \
                 temporary password to sign in.</p>",
                escape_html(name)
            ),
        ),
    }
}

pub fn business_onboarding(to: &str, unit_name: &str, onboarding_url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Finish setting up payments".to_string(),
        html: layout(
            "Your health unit is registered",
            &format!(
                "<p>{} is now listed on Care Marketplace.</p>\
                 <p>To receive orders, complete the payment onboarding:</p>\
                 <p><a href=\"{}\">Set up payments</a></p>",
                escape_html(unit_name),
                escape_html(onboarding_url)
            ),
        ),
    }
}

pub fn collaborator_invite(to: &str, name: &str, unit_name: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("You were added to {}", unit_name),
        html: layout(
            "Team invitation",
            &format!(
                "<p>Hello {},</p><p>You now have access to {} on Care Marketplace. \
                 A temporary password was sent separately.</p>",
                escape_html(name),
                escape_html(unit_name)
            ),
        ),
    }
}

pub fn order_status(to: &str, order_id: &str, status: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Order {} is {}", order_id, status.replace('_', " ")),
        html: layout(
            "Order update",
            &format!(
                "<p>Your order <strong>{}</strong> is now <strong>{}</strong>.</p>",
                escape_html(order_id),
                escape_html(&status.replace('_', " "))
            ),
        ),
    }
}

pub fn payment_receipt(
    to: &str,
    order_id: &str,
    amount: i64,
    currency: &str,
    invoice_number: Option<&str>,
    invoice_url: Option<&str>,
) -> Email {
    let mut body = format!(
        "<p>We received your payment of <strong>{}</strong> for order {}.</p>",
        escape_html(&format_amount(amount, currency)),
        escape_html(order_id)
    );
    if let Some(number) = invoice_number {
        body.push_str(&format!("<p>Invoice: {}</p>", escape_html(number)));
    }
    if let Some(url) = invoice_url {
        body.push_str(&format!("<p><a href=\"{}\">Download invoice</a></p>", escape_html(url)));
    }

    Email {
        to: to.to_string(),
        subject: format!("Payment receipt for order {}", order_id),
        html: layout("Payment received", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_escaped() {
        let email = welcome("a@x.pt", "<script>alert(1)</script>");
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_receipt_includes_invoice_when_present() {
        let email = payment_receipt("a@x.pt", "65f0", 4550, "eur", Some("FT 1/12"), None);
        assert!(email.html.contains("45.50 EUR"));
        assert!(email.html.contains("FT 1/12"));
        assert!(!email.html.contains("Download invoice"));
    }

    #[test]
    fn test_status_subject_is_readable() {
        let email = order_status("a@x.pt", "65f0", "payment_failed");
        assert_eq!(email.subject, "Order 65f0 is payment failed");
    }
}
