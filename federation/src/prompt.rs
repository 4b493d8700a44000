use crate::resolver::RolePrompt;
use crate::role::Account;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use std::fmt::Write;

/// Terminal role selection: prints the numbered listing to stderr and reads a
/// 1-based index. Answering `q` cancels.
#[derive(Default)]
pub struct DialoguerPrompt {
    theme: ColorfulTheme,
}

impl RolePrompt for DialoguerPrompt {
    fn ask(&mut self, listing: &[Account], attempt: usize) -> Option<String> {
        if attempt == 1 {
            eprint!("{}", render_listing(listing));
        }

        let answer: String = Input::with_theme(&self.theme)
            .with_prompt("Role number (q to cancel)")
            .allow_empty(true)
            .interact_text()
            .ok()?;

        if answer.trim().eq_ignore_ascii_case("q") {
            None
        } else {
            Some(answer)
        }
    }
}

/// Renders accounts and their roles, numbering roles from 1 across the whole
/// listing.
pub fn render_listing(listing: &[Account]) -> String {
    let mut output = String::new();
    let mut number = 0;

    for account in listing {
        let _ = writeln!(output, "Account: {}", account.name);
        for role in &account.roles {
            number += 1;
            let _ = writeln!(output, "  [{}] {} {}", number, role.name, role.role_arn);
        }
        let _ = writeln!(output);
    }

    output
}
