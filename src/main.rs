mod config;
mod controller;
mod error;
mod gemini;
mod prompt;
mod render;
mod sections;

use iced::{
    widget::{
        button, checkbox, column, container, horizontal_rule, rich_text, row, scrollable, span,
        text, text_editor,
    },
    alignment, clipboard, font, time, window, Element, Font, Length, Padding, Size,
    Subscription, Task, Theme,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::controller::Controller;
use crate::error::Error;
use crate::gemini::{GeminiClient, Generator};
use crate::render::{Block, Inline};

const DESCRIPTION: &str = "Paste your webpage content below and our AI will act as an Email Deliverability Architect and Content Specialist to craft the perfect email.";
const PLACEHOLDER: &str = "Paste your product, service, or offer webpage content here...";
const THINKING_HINT: &str = "For highly complex content, our AI will take more time to perform a deeper, more creative analysis.";
const LOADING_CAPTION: &str = "Analyzing content and crafting your email... This may take a moment.";
const UNEXPECTED_FORMAT: &str = "The response did not contain the expected sections. Showing it as received:";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn view_inlines<'a>(inlines: Vec<Inline>, size: f32) -> Element<'a, Message> {
    let spans: Vec<text::Span<'a, Message>> = inlines
        .into_iter()
        .map(|inline| {
            let mut font = if inline.style.code { Font::MONOSPACE } else { Font::DEFAULT };
            if inline.style.strong {
                font.weight = font::Weight::Bold;
            }
            if inline.style.emphasis {
                font.style = font::Style::Italic;
            }
            span(inline.text)
                .font(font)
                .size(size)
                .strikethrough(inline.style.strikethrough)
                .underline(inline.style.link)
        })
        .collect();

    rich_text(spans).into()
}

fn view_table_row<'a>(cells: Vec<Vec<Inline>>, is_header: bool) -> Element<'a, Message> {
    let mut cols = row![].spacing(12);
    for mut cell in cells {
        if is_header {
            cell.iter_mut().for_each(|inline| inline.style.strong = true);
        }
        cols = cols.push(container(view_inlines(cell, 14.0)).width(Length::FillPortion(1)));
    }
    cols.into()
}

fn view_blocks<'a>(blocks: Vec<Block>) -> Element<'a, Message> {
    let mut body = column![].spacing(10);

    for block in blocks {
        let element = match block {
            Block::Heading(inlines) => view_inlines(inlines, 17.0),
            Block::Paragraph(inlines) => view_inlines(inlines, 14.0),
            Block::ListItem { depth, marker, content } => row![
                text(marker).size(14).width(Length::Fixed(24.0)),
                view_inlines(content, 14.0),
            ]
            .padding(Padding { left: 18.0 * depth as f32, ..Padding::ZERO })
            .into(),
            Block::Table { header, rows } => {
                let mut table = column![view_table_row(header, true), horizontal_rule(1.0)].spacing(6);
                for cells in rows {
                    table = table.push(view_table_row(cells, false));
                }
                table.into()
            }
            Block::Code(code) => container(text(code).font(Font::MONOSPACE).size(13))
                .padding(10)
                .width(Length::Fill)
                .style(container::rounded_box)
                .into(),
            Block::Rule => horizontal_rule(1.0).into(),
        };
        body = body.push(element);
    }

    body.into()
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("EMAIL_EXPERT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> iced::Result {
    init_logging();

    let config = config::Config::load();
    let window_settings = window::Settings {
        size: Size::new(config.window.width as f32, config.window.height as f32),
        min_size: Some(Size::new(config.window.min_width as f32, config.window.min_height as f32)),
        position: window::Position::Centered,
        ..Default::default()
    };

    iced::application("AI Email Expert", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window_settings)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    EditorAction(text_editor::Action),
    ThinkingToggled,
    Generate,
    Regenerate,
    GenerationFinished(Result<String, Error>),
    Tick,
    CopySection(usize),
    CopyAll,
}

struct App {
    controller: Controller,
    editor: text_editor::Content,
    loading_frame: usize,
    generator: Arc<dyn Generator>,
}

impl App {
    fn new(config: config::Config) -> (Self, Task<Message>) {
        let api_key = config.gemini.api_key();
        if api_key.is_none() {
            tracing::warn!(
                env = %config.gemini.api_key_env,
                "no Gemini API key configured; generation will fail until one is set"
            );
        }

        let client = GeminiClient::with_config(config.gemini.base_url, config.gemini.model, api_key);
        tracing::info!(model = client.get_model(), "generation client ready");

        let app = App {
            controller: Controller::new(),
            editor: text_editor::Content::new(),
            loading_frame: 0,
            generator: Arc::new(client),
        };

        (app, Task::none())
    }

    fn dispatch(&mut self, request: Option<prompt::GenerationRequest>) -> Task<Message> {
        match request {
            Some(request) => {
                self.loading_frame = 0;
                Task::perform(
                    controller::dispatch(self.generator.clone(), request),
                    Message::GenerationFinished,
                )
            }
            None => Task::none(),
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::EditorAction(action) => {
                self.editor.perform(action);
                self.controller.set_input(self.editor.text());
                Task::none()
            }
            Message::ThinkingToggled => {
                self.controller.toggle_thinking();
                Task::none()
            }
            Message::Generate => {
                let request = self.controller.generate();
                self.dispatch(request)
            }
            Message::Regenerate => {
                let request = self.controller.regenerate();
                self.dispatch(request)
            }
            Message::GenerationFinished(outcome) => {
                self.controller.finish(outcome);
                Task::none()
            }
            Message::Tick => {
                if self.controller.is_loading() {
                    self.loading_frame = (self.loading_frame + 1) % SPINNER_FRAMES.len();
                }
                Task::none()
            }
            Message::CopySection(index) => {
                match self.controller.rendered_sections().into_iter().nth(index) {
                    Some(section) => clipboard::write(section.html),
                    None => Task::none(),
                }
            }
            Message::CopyAll => {
                let sections = self.controller.rendered_sections();
                clipboard::write(render::render_document(&sections))
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.controller.is_loading() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    fn view_input(&self) -> Element<Message> {
        let loading = self.controller.is_loading();

        let mut editor = text_editor(&self.editor)
            .placeholder(PLACEHOLDER)
            .height(Length::Fixed(220.0))
            .padding(12);
        if !loading {
            editor = editor.on_action(Message::EditorAction);
        }

        let mut toggle = checkbox("Enable Deep Thinking Mode", self.controller.thinking_enabled());
        if !loading {
            toggle = toggle.on_toggle(|_| Message::ThinkingToggled);
        }

        let mut buttons = row![
            button(text(self.controller.primary_label()))
                .padding(10)
                .on_press_maybe((!loading).then_some(Message::Generate))
        ]
        .spacing(10);

        if self.controller.can_regenerate() {
            buttons = buttons.push(
                button(text("Regenerate"))
                    .padding(10)
                    .on_press(Message::Regenerate),
            );
        }

        column![
            editor,
            column![toggle, text(THINKING_HINT).size(13)].spacing(4),
            buttons,
        ]
        .spacing(15)
        .into()
    }

    fn view_results(&self) -> Element<Message> {
        let mut results = column![].spacing(15);

        if self.controller.is_loading() {
            results = results.push(
                container(
                    column![
                        text(SPINNER_FRAMES[self.loading_frame]).size(32),
                        text(LOADING_CAPTION).size(15),
                    ]
                    .spacing(10)
                    .align_x(alignment::Horizontal::Center),
                )
                .width(Length::Fill)
                .align_x(alignment::Horizontal::Center),
            );
        }

        if let Some(message) = self.controller.error_message() {
            results = results.push(
                container(text(message).style(text::danger))
                    .padding(12)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
        }

        if self.controller.has_unexpected_format() {
            let raw = self.controller.generated_markdown().unwrap_or_default().to_string();
            results = results.push(
                container(column![text(UNEXPECTED_FORMAT).size(15), text(raw).size(14)].spacing(10))
                    .padding(15)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
        }

        let sections = self.controller.sections();
        if !sections.is_empty() {
            results = results.push(
                container(button(text("Copy All").size(14)).on_press(Message::CopyAll).padding(8))
                    .width(Length::Fill)
                    .align_x(alignment::Horizontal::Right),
            );
        }

        for (index, section) in sections.into_iter().enumerate() {
            let card = column![
                text(section.title).size(20),
                view_blocks(render::markdown_blocks(&section.body)),
                container(button(text("Copy HTML").size(13)).on_press(Message::CopySection(index)).padding(6))
                    .width(Length::Fill)
                    .align_x(alignment::Horizontal::Right),
            ]
            .spacing(12);

            results = results.push(
                container(card)
                    .padding(15)
                    .width(Length::Fill)
                    .style(container::rounded_box),
            );
        }

        results.into()
    }

    fn view(&self) -> Element<Message> {
        let header = column![
            text("📧").size(36),
            text("AI Email Expert").size(28),
            text(DESCRIPTION).size(15),
        ]
        .spacing(8)
        .align_x(alignment::Horizontal::Center)
        .width(Length::Fill);

        let footer = container(text("Powered by Gemini").size(12))
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Center);

        scrollable(
            column![header, self.view_input(), self.view_results(), footer]
                .spacing(20)
                .padding(20),
        )
        .height(Length::Fill)
        .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
