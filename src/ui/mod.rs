use iced::{
    widget::{button, column, progress_bar, text, Space},
    Element, Length,
};

use crate::domain::DownloadStatus;

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    DownloadPressed(usize),
    CancelPressed(usize),
    LoadPressed(usize),
}

/// What the view needs to know about one catalog entry.
pub struct ModelRow<'a> {
    pub index: usize,
    pub name: &'a str,
    pub status: DownloadStatus,
    pub progress: f32,
}

pub fn view<'a>(rows: Vec<ModelRow<'a>>, status_line: &'a str) -> Element<'a, DownloadMessage> {
    let mut content = column![
        text("Model Fetcher").size(32),
        Space::new().height(Length::Fixed(20.0)),
    ]
    .padding(20)
    .spacing(10);

    for row in rows {
        content = content.push(model_row(row));
    }

    content = content.push(Space::new().height(Length::Fixed(10.0)));
    content = content.push(text(status_line).size(14));
    content.into()
}

fn model_row(row: ModelRow<'_>) -> Element<'_, DownloadMessage> {
    match row.status {
        DownloadStatus::NotStarted => button(text(format!("Download {}", row.name)))
            .on_press(DownloadMessage::DownloadPressed(row.index))
            .padding([10, 20])
            .into(),
        DownloadStatus::Downloading => column![
            button(text(format!(
                "{} (Downloading {}%)",
                row.name,
                (row.progress * 100.0) as i32
            )))
            .on_press(DownloadMessage::CancelPressed(row.index))
            .padding([10, 20]),
            progress_bar(0.0..=1.0, row.progress),
        ]
        .spacing(5)
        .into(),
        DownloadStatus::Downloaded => button(text(format!("Load {}", row.name)))
            .on_press(DownloadMessage::LoadPressed(row.index))
            .padding([10, 20])
            .into(),
        DownloadStatus::Failed => button(text(format!("Retry {}", row.name)))
            .on_press(DownloadMessage::DownloadPressed(row.index))
            .padding([10, 20])
            .into(),
    }
}
