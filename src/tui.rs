//! Terminal user interface.

use std::{cell::RefCell, fmt::Debug, rc::Rc, sync::mpsc::Receiver, thread::JoinHandle};

use cursive::{
    view::Scrollable,
    views::{
        stack_view::{Fullscreen, Transparent},
        Dialog, LinearLayout, TextView,
    },
    CbSink, Cursive, CursiveExt,
};

pub(crate) use self::dialog::GuidedDialogButton;
use crate::{
    error::{InstallerError, InstallerErrorKind},
    locale::Locale,
    prompt::{Prompter, Question},
};

mod bg;
mod dialog;

pub(crate) struct Tui {
    channel: Option<CbSink>,
    handle: Option<JoinHandle<std::io::Result<()>>>,
    app_name: String,
    app_version: String,
    locale: Locale,
}

impl Tui {
    pub fn new() -> Self {
        Self {
            channel: None,
            handle: None,
            app_name: String::new(),
            app_version: String::new(),
            locale: Locale::with_system(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.channel.is_some()
    }

    pub fn set_name(&mut self, app_name: &str, app_version: &str) {
        self.app_name = app_name.to_string();
        self.app_version = app_version.to_string();
    }

    pub fn set_lang_tag(&mut self, value: &str) {
        self.locale.set_language_tag(value);
    }

    pub fn run_background(&mut self) -> Result<(), InstallerError> {
        if self.is_running() {
            return Ok(());
        }

        let (sender, receiver) = std::sync::mpsc::sync_channel(1);

        let join_handle = std::thread::spawn(move || {
            let mut cursive = cursive::Cursive::new();
            let _ = sender.send(cursive.cb_sink().clone());

            cursive.run_crossterm()
        });

        self.handle = Some(join_handle);

        let channel = receiver
            .recv()
            .map_err(|_error| InstallerError::new(InstallerErrorKind::Terminal))?;
        self.channel = Some(channel);

        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), InstallerError> {
        if let Some(channel) = self.channel.take() {
            let _ = channel.send(Box::new(|cursive| cursive.quit()));
        }

        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_panic| InstallerError::new(InstallerErrorKind::Terminal))??;
        }

        Ok(())
    }

    fn show_wait_dialog<D, T>(
        &self,
        dialog: D,
        dialog_receiver: Receiver<T>,
    ) -> Result<T, InstallerError>
    where
        D: cursive::View,
        T: Send + 'static,
    {
        self.in_cursive(move |cursive| {
            cursive.add_layer(dialog);
        })?;

        dialog_receiver
            .recv()
            .map_err(|_error| InstallerErrorKind::Terminal.into())
    }

    pub fn set_up_background_text(&self, is_uninstall: bool) -> Result<(), InstallerError> {
        let text_id = if is_uninstall {
            "uninstaller-title"
        } else {
            "installer-title"
        };
        let title = self
            .locale
            .text_args(text_id, [("app_name", (&self.app_name).into())]);
        let footer = self.locale.text("setup-footer");

        let view = bg::BannerView::new(&title, &footer);

        self.in_cursive(|cursive| {
            cursive
                .screen_mut()
                .add_layer(Transparent(Fullscreen(view)));
        })
    }

    pub fn show_error<E>(&self, error: E) -> Result<(), InstallerError>
    where
        E: std::error::Error,
    {
        let layout = LinearLayout::vertical()
            .child(TextView::new(self.locale.text("error-occurred")))
            .child(TextView::new("\n"))
            .child(TextView::new(self.locale.text("error-details")))
            .child(TextView::new("\n"))
            .child(TextView::new(crate::error::format_error(error)).scrollable());

        let (mut dialog, dialog_receiver) = dialog::info_dialog(&self.locale, "");
        dialog.set_content(layout);

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    pub fn show_unneeded_install(&self, is_uninstall: bool) -> Result<(), InstallerError> {
        let text = if is_uninstall {
            self.locale.text("app-not-installed")
        } else {
            self.locale.text("app-already-installed")
        };

        let (mut dialog, dialog_receiver) = dialog::info_dialog(&self.locale, "");
        dialog.set_content(TextView::new(text).scrollable());

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    fn intro(&self, text_id: &str) -> Result<GuidedDialogButton<()>, InstallerError> {
        let args = [
            ("app_name", (&self.app_name).into()),
            ("app_version", (&self.app_version).into()),
        ];
        let text = self.locale.text_args(text_id, args);

        let (mut dialog, dialog_receiver) = dialog::guided_dialog(&self.locale, "", |_| ());
        dialog.set_content(TextView::new(text).scrollable());

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    pub fn installation_intro(&self) -> Result<GuidedDialogButton<()>, InstallerError> {
        self.intro("installer-intro")
    }

    pub fn uninstallation_intro(&self) -> Result<GuidedDialogButton<()>, InstallerError> {
        self.intro("uninstaller-intro")
    }

    fn item_list(&self, text_id: &str, items: &[String]) -> String {
        let mut text = self.locale.text_args(text_id, [("app_name", (&self.app_name).into())]);
        text.push('\n');

        for item in items {
            text.push_str("\n • ");
            text.push_str(item);
        }

        text
    }

    pub fn prompt_install_confirm(
        &self,
        items: &[String],
    ) -> Result<GuidedDialogButton<()>, InstallerError> {
        let text = self.item_list("installer-confirm", items);

        let (mut dialog, dialog_receiver) = dialog::guided_dialog(&self.locale, "", |_| ());
        dialog.set_content(TextView::new(text).scrollable());

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    pub fn prompt_uninstall_confirm(
        &self,
        items: &[String],
    ) -> Result<GuidedDialogButton<()>, InstallerError> {
        let text = self.item_list("uninstaller-confirm", items);

        let (mut dialog, dialog_receiver) = dialog::guided_dialog(&self.locale, "", |_| ());
        dialog.set_content(TextView::new(text).scrollable());

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    pub fn prompt_prerequisite(&self, program: &str, command: &str) -> Result<bool, InstallerError> {
        let text = self.locale.text_args(
            "prerequisite-prompt",
            [("program", program.into()), ("command", command.into())],
        );
        let title = self.locale.text("prerequisite-title");

        let (dialog, dialog_receiver) = dialog::confirm_dialog(&self.locale, &title, text);

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    fn conclusion(
        &self,
        text_id: &str,
        warnings_text_id: &str,
        warnings: &[String],
    ) -> Result<(), InstallerError> {
        let text = if warnings.is_empty() {
            self.locale
                .text_args(text_id, [("app_name", (&self.app_name).into())])
        } else {
            self.item_list(warnings_text_id, warnings)
        };

        let (mut dialog, dialog_receiver) = dialog::info_dialog(&self.locale, "");
        dialog.set_content(TextView::new(text).scrollable());

        self.show_wait_dialog(dialog, dialog_receiver)
    }

    pub fn installation_conclusion(&self, warnings: &[String]) -> Result<(), InstallerError> {
        self.conclusion(
            "installer-conclusion",
            "installer-conclusion-warnings",
            warnings,
        )
    }

    pub fn uninstallation_conclusion(&self, warnings: &[String]) -> Result<(), InstallerError> {
        self.conclusion(
            "uninstaller-conclusion",
            "uninstaller-conclusion-warnings",
            warnings,
        )
    }

    pub fn show_progress_dialog(&self, is_uninstall: bool) -> Result<(), InstallerError> {
        let dialog = dialog::progress_dialog("");
        let text = if is_uninstall {
            self.locale.text("uninstalling")
        } else {
            self.locale.text("installing")
        };

        self.in_cursive(move |cursive| {
            cursive.add_layer(dialog);
            dialog::set_progress_dialog_text(cursive, &text);
        })
    }

    pub fn hide_progress_dialog(&self) -> Result<(), InstallerError> {
        self.in_cursive(|cursive| {
            dialog::dismiss_progress_dialog(cursive);
        })
    }

    pub fn update_progress(
        &mut self,
        current: u64,
        total: u64,
        step: Option<String>,
    ) -> Result<(), InstallerError> {
        self.in_cursive(move |cursive| {
            dialog::update_progress_dialog_bar(cursive, current, total);

            if let Some(step) = step {
                dialog::set_progress_dialog_subtext(cursive, &step);
            }
        })
    }

    fn in_cursive<F, T>(&self, func: F) -> Result<T, InstallerError>
    where
        F: FnOnce(&mut Cursive) -> T + Send + 'static,
        T: Send + 'static,
    {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| InstallerError::new(InstallerErrorKind::Terminal).with_context("not running"))?;
        let (sender, receiver) = std::sync::mpsc::sync_channel(1);

        let result = channel.send(Box::new(move |cursive| {
            let _ = sender.send(func(cursive));
        }));

        if result.is_err() {
            Err(InstallerErrorKind::Terminal.into())
        } else {
            receiver
                .recv()
                .map_err(|_e| InstallerErrorKind::Terminal.into())
        }
    }
}

impl Debug for Tui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tui")
            .field("running", &self.is_running())
            .field("app_name", &self.app_name)
            .finish()
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Some(channel) = &mut self.channel {
            let _ = channel.send(Box::new(|cursive| cursive.quit()));
        }
    }
}

/// Asks questions raised while the installer runs through dialogs.
///
/// The progress dialog stays underneath and is shown again once answered.
pub(crate) struct TuiPrompter {
    tui: Rc<RefCell<Tui>>,
}

impl TuiPrompter {
    pub fn new(tui: Rc<RefCell<Tui>>) -> Self {
        Self { tui }
    }
}

impl Prompter for TuiPrompter {
    fn confirm(&mut self, question: &Question) -> Result<bool, InstallerError> {
        let tui = self.tui.borrow();

        match question {
            Question::Install { items } => {
                Ok(tui.prompt_install_confirm(items)?.unwrap_button().is_ok())
            }
            Question::Uninstall { items } => {
                Ok(tui.prompt_uninstall_confirm(items)?.unwrap_button().is_ok())
            }
            Question::InstallPrerequisite { program, command } => {
                tui.prompt_prerequisite(program, command)
            }
        }
    }
}
