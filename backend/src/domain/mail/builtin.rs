//! Templates bundled with the mail service.

use super::template_store::{MailTemplate, TemplateKey};

struct Source {
    id: &'static str,
    locale: &'static str,
    subject: &'static str,
    text: &'static str,
    html: &'static str,
}

const SOURCES: &[Source] = &[
    Source {
        id: "welcome",
        locale: "ja",
        subject: "{{ name }}さん、家族日記へようこそ",
        text: "{{ name }}さん\n\n家族日記へのご登録ありがとうございます。\n今日の出来事を家族と共有してみましょう。\n",
        html: "<p>{{ name }}さん</p>\n<p>家族日記へのご登録ありがとうございます。<br>今日の出来事を家族と共有してみましょう。</p>\n",
    },
    Source {
        id: "welcome",
        locale: "en",
        subject: "Welcome to Family Diary, {{ name }}",
        text: "Hi {{ name }},\n\nThanks for joining Family Diary.\nStart sharing your day with your family.\n",
        html: "<p>Hi {{ name }},</p>\n<p>Thanks for joining Family Diary.<br>Start sharing your day with your family.</p>\n",
    },
    Source {
        id: "family_invitation",
        locale: "ja",
        subject: "{{ inviter_name }}さんから「{{ family_name }}」への招待が届きました",
        text: "{{ inviter_name }}さんが「{{ family_name }}」の日記にあなたを招待しています。\n\n参加するには次のリンクを開いてください:\n{{ invite_url }}\n",
        html: "<p>{{ inviter_name }}さんが「{{ family_name }}」の日記にあなたを招待しています。</p>\n<p><a href=\"{{ invite_url }}\">招待を受け取る</a></p>\n",
    },
    Source {
        id: "family_invitation",
        locale: "en",
        subject: "{{ inviter_name }} invited you to {{ family_name }}",
        text: "{{ inviter_name }} has invited you to the {{ family_name }} diary.\n\nOpen this link to join:\n{{ invite_url }}\n",
        html: "<p>{{ inviter_name }} has invited you to the {{ family_name }} diary.</p>\n<p><a href=\"{{ invite_url }}\">Accept the invitation</a></p>\n",
    },
    Source {
        id: "weekly_digest",
        locale: "ja",
        subject: "「{{ family_name }}」の今週のまとめ",
        text: "{{ name }}さん\n\n今週の投稿数: {{ post_count }}\n現在の連続投稿日数: {{ streak }}日\n",
        html: "<p>{{ name }}さん</p>\n<ul>\n<li>今週の投稿数: {{ post_count }}</li>\n<li>現在の連続投稿日数: {{ streak }}日</li>\n</ul>\n",
    },
    Source {
        id: "weekly_digest",
        locale: "en",
        subject: "Your week in {{ family_name }}",
        text: "Hi {{ name }},\n\nPosts this week: {{ post_count }}\nCurrent streak: {{ streak }} days\n",
        html: "<p>Hi {{ name }},</p>\n<ul>\n<li>Posts this week: {{ post_count }}</li>\n<li>Current streak: {{ streak }} days</li>\n</ul>\n",
    },
];

/// Every bundled template variant.
pub(super) fn templates() -> impl Iterator<Item = (TemplateKey, MailTemplate)> {
    SOURCES.iter().map(|source| {
        (
            TemplateKey::new(source.id, source.locale),
            MailTemplate {
                subject: source.subject.to_owned(),
                text: source.text.to_owned(),
                html: source.html.to_owned(),
            },
        )
    })
}
