//! Server-rendered HTML pages.

use recipes_identity::{User, UserDetails};
use std::collections::BTreeMap;

use crate::auth::csrf::{CSRF_FIELD, CsrfToken};

/// Escapes text for inclusion in HTML content or attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn csrf_field(csrf: &CsrfToken) -> String {
    format!(
        "<input type=\"hidden\" name=\"{CSRF_FIELD}\" value=\"{}\">",
        escape(csrf.as_str())
    )
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{} - Recipes</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

/// Renders the home page for an anonymous visitor or a signed-in user.
#[must_use]
pub fn index(user: Option<&User>, csrf: &CsrfToken) -> String {
    let body = match user {
        Some(user) if !user.needs_registration() => format!(
            "<h1>Recipes</h1>\n<p>Signed in as {}.</p>\n{}",
            escape(user.name()),
            logout_form(csrf)
        ),
        Some(_) => format!(
            "<h1>Recipes</h1>\n<p><a href=\"/auth/complete-registration\">Finish setting up your account</a></p>\n{}",
            logout_form(csrf)
        ),
        None => "<h1>Recipes</h1>\n<p><a href=\"/auth/login\">Log in</a></p>".to_string(),
    };
    layout("Home", &body)
}

fn logout_form(csrf: &CsrfToken) -> String {
    format!(
        "<form method=\"post\" action=\"/auth/logout\">{}<button type=\"submit\">Log out</button></form>",
        csrf_field(csrf)
    )
}

/// Renders the registration-completion form.
///
/// `details` pre-fills the form; `problems` maps field names to messages.
#[must_use]
pub fn registration_form(
    details: &UserDetails,
    problems: &BTreeMap<&'static str, String>,
    csrf: &CsrfToken,
) -> String {
    let name_problem = problems
        .get("name")
        .map(|problem| format!("<p class=\"error\">{}</p>\n", escape(problem)))
        .unwrap_or_default();

    let body = format!(
        "<h1>Complete registration</h1>\n\
         <form method=\"post\" action=\"/auth/complete-registration\">\n\
         {}\n\
         <label for=\"name\">Name</label>\n\
         <input id=\"name\" name=\"name\" type=\"text\" value=\"{}\">\n\
         {}<button type=\"submit\">Save</button>\n</form>",
        csrf_field(csrf),
        escape(&details.name),
        name_problem
    );
    layout("Complete registration", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipes_core::ExternalId;

    #[test]
    fn escape_handles_markup() {
        assert_eq!(
            escape("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn anonymous_index_links_to_login() {
        let page = index(None, &CsrfToken::default());
        assert!(page.contains("href=\"/auth/login\""));
        assert!(!page.contains("/auth/logout"));
    }

    #[test]
    fn index_greets_registered_user() {
        let mut user = User::new(ExternalId::new("108234"));
        user.apply_details(&UserDetails {
            name: "<Alice>".to_string(),
        });

        let page = index(Some(&user), &CsrfToken::new("form-token"));
        assert!(page.contains("Signed in as &lt;Alice&gt;."));
        assert!(page.contains("action=\"/auth/logout\""));
        assert!(page.contains("name=\"csrf_token\" value=\"form-token\""));
    }

    #[test]
    fn index_prompts_unregistered_user() {
        let user = User::new(ExternalId::new("108234"));
        let page = index(Some(&user), &CsrfToken::new("form-token"));
        assert!(page.contains("/auth/complete-registration"));
    }

    #[test]
    fn registration_form_shows_problems() {
        let details = UserDetails {
            name: "  ".to_string(),
        };
        let page = registration_form(&details, &details.validate(), &CsrfToken::new("a\"b"));
        assert!(page.contains("This field is required."));
        assert!(page.contains("value=\"  \""));
        assert!(page.contains("name=\"csrf_token\" value=\"a&quot;b\""));
    }
}
