//! Fixed message templates.
//!
//! Two templates exist: the real absence notice sent to students/parents and
//! a short verification message used by the test dispatch path. Template
//! selection is the caller's; templates themselves never change at runtime.

/// Title and body of one portal message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: &'static str,
    pub body: &'static str,
}

pub const ABSENCE_NOTICE: MessageTemplate = MessageTemplate {
    title: "방과후학교 면학 출결 안내",
    body: "안녕하세요, 충남삼성고등학교입니다.\n\n\
본 메시지는 금일 08:30 면학실 출석 확인이 되지 않은 학생을 대상으로 자동 발송됩니다.\n\
출석 확인은 08:30부터 면학실에서 진행되오니,\n\
반드시 출석 체크를 완료한 후 방과후 교실로 이동해 주시기 바랍니다.\n\n\
원활한 운영을 위해 협조 부탁드립니다.\n\
감사합니다.\n\n\
충남삼성고등학교 드림",
};

pub const TEST_NOTICE: MessageTemplate = MessageTemplate {
    title: "방과후학교 면학 출결 안내",
    body: "이 메시지는 신규 프로그램 테스트를 위해 자동으로 보내진 메시지입니다.",
};

/// Display name of the staff member who receives verification sends.
pub const TEST_RECIPIENT_NAME: &str = "민수정";
