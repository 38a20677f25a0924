//! CLI 进度条管理：每个专辑一条曲目进度，每个正在传输的文件一条字节进度。

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

#[derive(Clone)]
pub struct ProgressHub {
    mp: MultiProgress,
    visible: bool,
}

impl ProgressHub {
    pub fn stderr() -> Self {
        Self {
            mp: MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            visible: true,
        }
    }

    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            mp: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            visible: false,
        }
    }

    pub fn album_bar(&self, title: &str, tracks: usize) -> ProgressBar {
        if !self.visible {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let bar = self.mp.add(ProgressBar::new(tracks as u64));
        bar.set_style(style);
        bar.set_prefix(title.to_string());
        bar
    }

    /// `total` 为 0（服务器未给出长度）时退化为 spinner。
    pub fn transfer_bar(&self, name: &str, total: u64) -> ProgressBar {
        if !self.visible {
            return ProgressBar::hidden();
        }
        let bar = if total > 0 {
            let style = ProgressStyle::with_template(
                "{prefix:30!} {bar:30} {bytes}/{total_bytes} {bytes_per_sec}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
            let bar = ProgressBar::new(total);
            bar.set_style(style);
            bar
        } else {
            let style = ProgressStyle::with_template("{prefix:30!} {spinner} {bytes}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let bar = ProgressBar::new_spinner();
            bar.set_style(style);
            bar
        };
        let bar = self.mp.add(bar);
        bar.set_prefix(name.to_string());
        bar
    }
}
