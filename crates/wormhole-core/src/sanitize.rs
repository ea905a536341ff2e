//! 文件名清洗
//!
//! 把用户提供的任意文件名/文件夹名转换成在常见文件系统上都安全的名称。
//! 清洗本身从不失败；同名冲突由调用方通过 [`collision_prefixed`] 处理。

/// 常见文件系统上的非法字符
const ILLEGAL_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// 清洗文件名或文件夹名，返回值保证非空
pub fn sanitize(name: &str, is_dir: bool) -> String {
    let cleaned = if is_dir {
        replace_illegal(name)
    } else {
        // 扩展名单独保留，避免 "a.b.txt" 之类的名称丢失后缀
        let (base, ext) = split_extension(name);
        format!("{}{}", replace_illegal(base), replace_illegal(ext))
    };

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        random_name(is_dir)
    } else {
        trimmed.to_string()
    }
}

/// 在名称前加 4 位十六进制随机前缀，用于同名冲突
pub fn collision_prefixed(name: &str) -> String {
    let token: u16 = rand::random();
    format!("{:04x}_{}", token, name)
}

fn replace_illegal(s: &str) -> String {
    s.chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || u32::from(c) < 0x20 {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// 按最后一个点拆分扩展名；以点开头的名称（如 ".bashrc"）视为没有扩展名
fn split_extension(name: &str) -> (&str, &str) {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => name.split_at(stem_start + idx),
        None => (name, ""),
    }
}

fn random_name(is_dir: bool) -> String {
    let token: u32 = rand::random();
    if is_dir {
        format!("folder_{:08x}", token)
    } else {
        format!("file_{:08x}", token)
    }
}
