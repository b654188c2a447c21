use std::collections::{BTreeSet, HashMap};

use pdfseal_core::mode::{SignatureModeConfig, SignatureModeKind};

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SetModeCommand);
        bus.register(RemoveLastCommand);
        bus.register(ClearSignaturesCommand);
        bus.register(ListSignaturesCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

/// 解析以逗号分隔的页码列表（从 1 开始），返回从 0 开始的页索引。
pub fn parse_page_list(input: &str) -> Result<BTreeSet<usize>, String> {
    let mut pages = BTreeSet::new();
    for part in input.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let number: usize = part
            .parse()
            .map_err(|_| format!("无效页码: {part}"))?;
        if number == 0 {
            return Err("页码从 1 开始".to_string());
        }
        pages.insert(number - 1);
    }
    Ok(pages)
}

/// 由模式名称与附加参数构造模式配置。
///
/// `template <间隔> [模板页]`，`selective <页码> [排除页码]`。页码均从 1 开始。
pub fn parse_mode(args: &[String]) -> Result<SignatureModeConfig, String> {
    let (name, rest) = args.split_first().ok_or("缺少模式名称")?;
    let kind: SignatureModeKind = name.parse().map_err(|err| format!("{err}"))?;
    match kind {
        SignatureModeKind::Free | SignatureModeKind::Mass => {
            Ok(SignatureModeConfig::default_for(kind))
        }
        SignatureModeKind::Template => {
            let interval = rest
                .first()
                .ok_or("模板模式需要间隔参数")?
                .parse::<usize>()
                .ok()
                .filter(|interval| *interval > 0)
                .ok_or("模板间隔必须为正整数")?;
            let template_page = match rest.get(1) {
                Some(page) => page
                    .parse::<usize>()
                    .ok()
                    .and_then(|number| number.checked_sub(1))
                    .ok_or("模板页必须为从 1 开始的页码")?,
                None => 0,
            };
            Ok(SignatureModeConfig::Template {
                interval,
                template_page,
            })
        }
        SignatureModeKind::Selective => {
            let affected = parse_page_list(rest.first().ok_or("选择模式需要页码列表")?)?;
            let excluded = match rest.get(1) {
                Some(list) => parse_page_list(list)?,
                None => BTreeSet::new(),
            };
            Ok(SignatureModeConfig::Selective { affected, excluded })
        }
    }
}

struct SetModeCommand;

impl CommandHandler for SetModeCommand {
    fn name(&self) -> &'static str {
        "set_mode"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match parse_mode(&request.args) {
            Ok(config) => {
                let event = context.session.set_mode(config);
                CommandResponse::ok(format!(
                    "模式 {} -> {}，丢弃 {} 个签名，请重新加载文档",
                    event.previous,
                    event.current.kind(),
                    event.discarded
                ))
            }
            Err(message) => CommandResponse::err(message),
        }
    }
}

struct RemoveLastCommand;

impl CommandHandler for RemoveLastCommand {
    fn name(&self) -> &'static str {
        "remove_last"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.remove_last_signature() {
            Some(signature) => {
                CommandResponse::ok(format!("已移除第 {} 页的签名", signature.page_index + 1))
            }
            None => CommandResponse::err("没有可移除的签名"),
        }
    }
}

struct ClearSignaturesCommand;

impl CommandHandler for ClearSignaturesCommand {
    fn name(&self) -> &'static str {
        "clear_signatures"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let removed = context.session.clear_signatures();
        CommandResponse::ok(format!("已清空 {removed} 个签名"))
    }
}

struct ListSignaturesCommand;

impl CommandHandler for ListSignaturesCommand {
    fn name(&self) -> &'static str {
        "list_signatures"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let signatures = context.session.document().signatures();
        if signatures.is_empty() {
            return CommandResponse::ok("当前没有签名");
        }
        let lines: Vec<String> = signatures
            .iter()
            .enumerate()
            .map(|(index, signature)| {
                format!(
                    "#{index} 第 {} 页 ({:.1}, {:.1}) {:.1}x{:.1} {:.1}°",
                    signature.page_index + 1,
                    signature.position.x(),
                    signature.position.y(),
                    signature.size.width,
                    signature.size.height,
                    signature.rotation_deg
                )
            })
            .collect();
        CommandResponse::ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use pdfseal_core::document::{Document, PageGeometry, StampRequest};
    use pdfseal_core::geometry::{Point2, Size2};

    use super::*;

    fn session() -> Session {
        let page = PageGeometry::new(595.0, 842.0).unwrap();
        let mut session = Session::new(Document::new("contract.pdf", vec![page; 4]));
        for page in [0, 2] {
            session
                .add_signature(StampRequest::new(
                    "firma.png",
                    page,
                    Point2::new(10.0, 20.0),
                    Size2::new(100.0, 50.0),
                ))
                .unwrap();
        }
        session
    }

    #[test]
    fn list_remove_and_clear_commands_work() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let list = bus.dispatch(
            &CommandRequest::new("list_signatures", Vec::<String>::new()),
            &mut context,
        );
        assert!(list.success);
        assert_eq!(list.message.unwrap().lines().count(), 2);

        let remove = bus.dispatch(
            &CommandRequest::new("remove_last", Vec::<String>::new()),
            &mut context,
        );
        assert!(remove.success);
        assert_eq!(context.session.document().signatures().len(), 1);

        let clear = bus.dispatch(
            &CommandRequest::new("clear_signatures", Vec::<String>::new()),
            &mut context,
        );
        assert!(clear.success);
        assert!(context.session.document().signatures().is_empty());

        let remove = bus.dispatch(
            &CommandRequest::new("remove_last", Vec::<String>::new()),
            &mut context,
        );
        assert!(!remove.success);
    }

    #[test]
    fn set_mode_command_parses_parameters() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let response = bus.dispatch(
            &CommandRequest::new("set_mode", ["plantilla", "2"]),
            &mut context,
        );
        assert!(response.success);
        assert!(context.session.document().signatures().is_empty());
        assert_eq!(context.session.pages_to_sign(), vec![0, 2]);

        let response = bus.dispatch(
            &CommandRequest::new("set_mode", ["selective", "1,3,4", "4"]),
            &mut context,
        );
        assert!(response.success);
        assert_eq!(context.session.pages_to_sign(), vec![0, 2]);

        let response = bus.dispatch(&CommandRequest::new("set_mode", ["diagonal"]), &mut context);
        assert!(!response.success);
        let response = bus.dispatch(&CommandRequest::new("set_mode", ["template"]), &mut context);
        assert!(!response.success);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut session = session();
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };
        let response = bus.dispatch(
            &CommandRequest::new("rotate_all", Vec::<String>::new()),
            &mut context,
        );
        assert!(!response.success);
        assert_eq!(bus.available_commands().count(), 4);
    }

    #[test]
    fn page_lists_are_one_based() {
        assert_eq!(parse_page_list("1, 3,3").unwrap(), BTreeSet::from([0, 2]));
        assert!(parse_page_list("0").is_err());
        assert!(parse_page_list("a").is_err());
        assert!(parse_page_list("").unwrap().is_empty());
    }

    #[test]
    fn template_arguments_use_page_numbers() {
        let args = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();

        assert_eq!(
            parse_mode(&args(&["template", "2", "3"])).unwrap(),
            SignatureModeConfig::Template {
                interval: 2,
                template_page: 2
            }
        );
        assert_eq!(
            parse_mode(&args(&["template", "3"])).unwrap(),
            SignatureModeConfig::template(3)
        );
        assert!(parse_mode(&args(&["template", "0"])).is_err());
        assert!(parse_mode(&args(&["template", "2", "0"])).is_err());
        assert!(parse_mode(&args(&["template", "-1"])).is_err());
    }
}
