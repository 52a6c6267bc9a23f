//! Upstream URLs. These mirror the live portal layout and change when it does.

/// Host serving the single-sign-on login form
pub const LOGIN_HOST: &str = "login.bit.edu.cn";

/// Identity provider login page (GET renders the form, POST submits it)
pub const IDENTITY_LOGIN_URL: &str = "https://login.bit.edu.cn/authserver/login";

/// Account status probe, answers `{"isNeed": bool}` for a username
pub const CAPTCHA_CHECK_URL: &str = "https://login.bit.edu.cn/authserver/checkNeedCaptcha.htl";

/// Requests issued after an identity login to hand the ticket to the portal apps
pub const IDENTITY_HANDOFF_URLS: &[&str] = &[
    "http://jxzxehall.bit.edu.cn/login?service=http://jxzxehall.bit.edu.cn/new/index.html",
    "http://jxzxehall.bit.edu.cn/appShow?appId=5959167891382285",
];

const PORTAL_APP: &str = "http://jxzxehallapp.bit.edu.cn/jwapp/sys";

/// Student info, doubles as the identity-realm probe
pub fn student_info_url() -> String {
    format!("{}/wdkbby/modules/xskcb/cxxsjbxx.do", PORTAL_APP)
}

pub fn current_term_url() -> String {
    format!("{}/wdkbby/modules/jshkcb/dqxnxq.do", PORTAL_APP)
}

pub fn class_periods_url() -> String {
    format!("{}/wdkbby/modules/jshkcb/jc.do", PORTAL_APP)
}

pub fn week_dates_url() -> String {
    format!("{}/wdkbby/wdkbByController/cxzkbrq.do", PORTAL_APP)
}

pub fn week_classes_url() -> String {
    format!("{}/wdkbby/modules/xskcb/cxxszhxqkb.do", PORTAL_APP)
}

pub fn exams_url() -> String {
    format!("{}/studentWdksapApp/WdksapController/cxxsksap.do", PORTAL_APP)
}

/// Tunnel origin and its cookie seed
pub const TUNNEL_ORIGIN: &str = "https://webvpn.bit.edu.cn/";
pub const TUNNEL_LOGIN_URL: &str = "https://webvpn.bit.edu.cn/login?cas_login=true";
pub const TUNNEL_BOOTSTRAP_COOKIES: &[&str] = &["show_vpn=0; Path=/", "refresh=1; Path=/"];

/// Legacy academic system as re-hosted by the tunnel
const TUNNEL_LEGACY: &str =
    "https://webvpn.bit.edu.cn/http/77726476706e69737468656265737421fae04c8f69326144300d8db9d6562d/jsxsd";

pub fn tunnel_probe_url() -> String {
    format!("{}/framework/main.jsp", TUNNEL_LEGACY)
}

/// Score listing; also the page that finalizes a fresh tunnel session
pub fn score_list_url() -> String {
    format!("{}/kscj/cjcx_list", TUNNEL_LEGACY)
}

pub fn score_detail_url() -> String {
    format!("{}/kscj/cjfx", TUNNEL_LEGACY)
}

/// Course-page host for file listings (reached through identity SSO)
pub fn course_view_url(course_id: &str) -> String {
    format!("https://lexue.bit.edu.cn/course/view.php?id={}", course_id)
}
